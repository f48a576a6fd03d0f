//! # Design
//!
//! - Provide structured, constant-message errors for the ingestion pipeline.
//! - Capture operation context (paths, patterns) to make failures
//!   reproducible in tests.
//! - Preserve source errors without interpolating context into error
//!   messages.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors produced while ingesting and processing files.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// IO failures while interacting with the filesystem.
    #[error("pipeline io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Walkdir traversal failures.
    #[error("pipeline walkdir failure")]
    Walkdir {
        /// Operation that triggered the walkdir failure.
        operation: &'static str,
        /// Path involved in the walkdir failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Globset compilation failures.
    #[error("pipeline glob failure")]
    Glob {
        /// Operation that triggered the glob failure.
        operation: &'static str,
        /// Glob pattern that failed to compile.
        pattern: String,
        /// Underlying globset error.
        source: globset::Error,
    },
    /// Filesystem notification subscription failures.
    #[error("pipeline watch failure")]
    Watch {
        /// Operation that triggered the notification failure.
        operation: &'static str,
        /// Path involved in the notification failure.
        path: PathBuf,
        /// Underlying notify error.
        source: notify::Error,
    },
    /// A file's size kept changing for the whole stability window.
    #[error("file never stabilised")]
    Unstable {
        /// Path that failed to stabilise.
        path: PathBuf,
        /// How long the pipeline waited before giving up.
        waited: Duration,
    },
    /// The codec collaborator reported a transformation failure.
    #[error("codec transformation failed")]
    Codec {
        /// Source path handed to the codec.
        path: PathBuf,
        /// Rendered failure chain from the codec.
        message: String,
    },
    /// The processing permit pool was closed during shutdown.
    #[error("permit pool closed")]
    Shutdown {
        /// Operation that observed the closed pool.
        operation: &'static str,
    },
}

impl PipelineError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn watch(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: notify::Error,
    ) -> Self {
        Self::Watch {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) const fn glob(
        operation: &'static str,
        pattern: String,
        source: globset::Error,
    ) -> Self {
        Self::Glob {
            operation,
            pattern,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn error_helpers_build_variants() {
        let io_err = PipelineError::io("probe", "path", io::Error::other("io"));
        assert!(matches!(io_err, PipelineError::Io { .. }));
        assert!(io_err.source().is_some());

        let Err(glob_error) = globset::Glob::new("[") else {
            panic!("expected glob compilation to fail");
        };
        let glob_err = PipelineError::glob("compile", "[".to_string(), glob_error);
        assert!(matches!(glob_err, PipelineError::Glob { .. }));
        assert!(glob_err.source().is_some());
    }
}
