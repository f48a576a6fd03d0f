//! Error types for configuration loading and validation.

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Structured errors emitted while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing required environment variable '{name}'")]
    MissingVar {
        /// Name of the absent variable.
        name: &'static str,
    },

    /// An environment variable was present but could not be parsed.
    #[error("invalid value '{value}' for '{name}': {reason}")]
    InvalidVar {
        /// Name of the offending variable.
        name: &'static str,
        /// Raw value as read from the environment.
        value: String,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },

    /// A configuration field failed semantic validation.
    #[error("invalid configuration field '{field}': {reason}")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
}
