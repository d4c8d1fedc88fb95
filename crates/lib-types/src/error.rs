//! Configuration errors.

use thiserror::Error;

/// Errors raised when a setting is rejected before it is applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Scalar setting outside its allowed band.
    #[error("{name} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Mode name that is not one of the supported set.
    #[error("Unknown {kind} mode '{value}'")]
    UnknownMode { kind: &'static str, value: String },

    /// Any other inconsistent setting.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn out_of_range(name: impl Into<String>, value: f64, min: f64, max: f64) -> Self {
        Self::OutOfRange {
            name: name.into(),
            value,
            min,
            max,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// Check `min <= value <= max`, rejecting NaN.
    pub fn check_range(name: &str, value: f64, min: f64, max: f64) -> ConfigResult<()> {
        if value >= min && value <= max {
            Ok(())
        } else {
            Err(Self::out_of_range(name, value, min, max))
        }
    }
}

/// Result type for configuration checks.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range() {
        assert!(ConfigError::check_range("x", 0.5, 0.0, 1.0).is_ok());
        assert!(ConfigError::check_range("x", 1.0, 0.0, 1.0).is_ok());
        assert!(ConfigError::check_range("x", f64::NAN, 0.0, 1.0).is_err());

        let err = ConfigError::check_range("CTLE peak", 25.0, 0.0, 20.0).unwrap_err();
        assert_eq!(err.to_string(), "CTLE peak = 25 is outside [0, 20]");
    }
}
