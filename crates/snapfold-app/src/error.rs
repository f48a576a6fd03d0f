//! # Design
//!
//! - Centralize application-level errors for bootstrap and orchestration.
//! - Keep error messages constant while carrying context fields for
//!   debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading or validation failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: snapfold_config::ConfigError,
    },
    /// Pipeline wiring failed.
    #[error("pipeline operation failed")]
    Pipeline {
        /// Operation identifier.
        operation: &'static str,
        /// Source pipeline error.
        source: snapfold_pipeline::PipelineError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: anyhow::Error,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Optional path involved in the failure.
        path: Option<PathBuf>,
        /// Source IO error.
        source: io::Error,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: snapfold_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn pipeline(
        operation: &'static str,
        source: snapfold_pipeline::PipelineError,
    ) -> Self {
        Self::Pipeline { operation, source }
    }

    pub(crate) const fn telemetry(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Telemetry { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "load",
            snapfold_config::ConfigError::MissingVar {
                name: "SNAPFOLD_WATCH_ROOT",
            },
        );
        assert!(matches!(config, AppError::Config { .. }));

        let pipeline = AppError::pipeline(
            "subscribe",
            snapfold_pipeline::PipelineError::Shutdown {
                operation: "permits.acquire",
            },
        );
        assert!(matches!(pipeline, AppError::Pipeline { .. }));

        let telemetry = AppError::telemetry("init", anyhow::anyhow!("subscriber already set"));
        assert!(matches!(telemetry, AppError::Telemetry { .. }));
    }
}
