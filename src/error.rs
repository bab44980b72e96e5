//! Error types for throttler construction.

use thiserror::Error;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised when a throttler is built from invalid parameters.
///
/// Construction is the only fallible operation: once a throttler exists,
/// consuming through it never produces an error of its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Invalid field value.
    #[error("invalid value for field '{field}': {message}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },
}

impl ConfigError {
    /// Name of the field that failed validation.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidValue { field, .. } => field,
        }
    }
}
