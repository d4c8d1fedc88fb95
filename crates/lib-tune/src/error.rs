//! Error types for tuning sessions and optimization tasks.

use lib_dsp::DspError;
use lib_import::ParseError;
use lib_types::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, evaluating or optimizing a tuning session.
#[derive(Debug, Error)]
pub enum TuneError {
    /// Out-of-range or inconsistent setting, rejected before any mutation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Channel or equalizer synthesis failed.
    #[error(transparent)]
    Dsp(#[from] DspError),

    /// Waveform file could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in '{path}': {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Tx tap index outside the tuner list.
    #[error("Tx tap index {index} out of range ({len} taps)")]
    NoSuchTap { index: usize, len: usize },

    /// The optimization was cancelled by the caller.
    #[error("Optimization cancelled")]
    Cancelled,

    /// The minimizer itself failed (not a non-convergence).
    #[error("Solver error: {0}")]
    Solver(String),
}

impl TuneError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn solver(message: impl Into<String>) -> Self {
        Self::Solver(message.into())
    }

    /// Whether this error ends a task as cancelled rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type for tuning operations.
pub type TuneResult<T> = Result<T, TuneError>;
