use std::path::PathBuf;
use thiserror::Error;

/// Errors reading or resampling a measured waveform.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed row. `column` is 1-based and points at the offending text.
    #[error("line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("line {line}: time {time} does not increase past {previous}")]
    TimeNotIncreasing { line: usize, time: f64, previous: f64 },

    #[error("need at least 2 data rows, found {0}")]
    TooFewRows(usize),

    #[error("sample period must be positive, got {0} s")]
    InvalidSamplePeriod(f64),

    #[error("{span} s span needs more than {max} samples")]
    SpanTooLong { span: f64, max: usize },
}

impl ParseError {
    pub fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            column,
            message: message.into(),
        }
    }
}
