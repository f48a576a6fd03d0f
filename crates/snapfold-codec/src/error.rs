//! # Design
//!
//! - Provide structured, constant-message errors for codec operations.
//! - Capture the path and operation so failures are reproducible in tests.
//! - Preserve source errors without interpolating context into messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors produced while re-encoding an image.
#[derive(Debug, Error)]
pub enum CodecError {
    /// IO failures while reading the source or writing the output.
    #[error("codec io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The source could not be decoded as a supported image.
    #[error("codec decode failure")]
    Decode {
        /// Path that failed to decode.
        path: PathBuf,
        /// Underlying image error.
        source: image::ImageError,
    },
    /// The encoded output could not be published atomically.
    #[error("codec publish failure")]
    Publish {
        /// Destination that could not be published.
        path: PathBuf,
        /// Underlying persist error.
        source: tempfile::PersistError,
    },
    /// The destination path has no parent directory to stage output in.
    #[error("codec destination has no parent directory")]
    NoParent {
        /// Offending destination path.
        path: PathBuf,
    },
}

impl CodecError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}
