//! Error types for DSP operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during DSP operations.
#[derive(Debug, Error)]
pub enum DspError {
    /// Transform length not usable.
    #[error("Invalid FFT size: {0}")]
    InvalidFftSize(usize),

    /// Input length mismatch.
    #[error("Input length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Channel waveform could not be imported.
    #[error("Failed to import '{path}': {message}")]
    Import { path: PathBuf, message: String },

    /// Response has no locatable positive peak.
    #[error("No impulse peak found in {0}")]
    PeakNotFound(String),

    /// Numerical instability detected.
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),
}

impl DspError {
    pub fn import(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Import {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for DSP operations.
pub type DspResult<T> = Result<T, DspError>;
