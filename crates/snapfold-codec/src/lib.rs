#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

//! WebP implementation of the pipeline's codec boundary.
//!
//! Decodes the common camera formats, downscales anything whose longest
//! edge exceeds the configured maximum (preserving aspect ratio), and
//! re-encodes to WebP. Re-encoding inherently strips non-essential
//! metadata. Output is staged in a temporary file beside the destination
//! and renamed into place so a reader never observes a truncated file.
//! CPU-bound work runs on the blocking pool, keeping the scheduler free.

mod error;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::GenericImageView;
use image::imageops::FilterType;
use snapfold_pipeline::{Codec, TransformReport, TransformRequest};
use tracing::debug;

pub use error::{CodecError, CodecResult};

/// File extension produced by this codec.
const TARGET_EXTENSION: &str = "webp";

/// Input extensions the codec will attempt to decode.
const SUPPORTED_INPUTS: &[&str] = &["jpg", "jpeg", "png"];

/// Stateless WebP re-encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebpCodec;

impl WebpCodec {
    /// Construct the codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Codec for WebpCodec {
    fn is_target_format(&self, path: &Path) -> bool {
        has_extension(path, TARGET_EXTENSION)
    }

    fn is_supported_input(&self, path: &Path) -> bool {
        SUPPORTED_INPUTS
            .iter()
            .any(|extension| has_extension(path, extension))
    }

    fn transformed_destination(&self, destination: &Path) -> PathBuf {
        destination.with_extension(TARGET_EXTENSION)
    }

    async fn transform(&self, request: TransformRequest<'_>) -> anyhow::Result<TransformReport> {
        let source = request.source.to_path_buf();
        let destination = request.destination.to_path_buf();
        let max_dimension = request.max_dimension;
        let quality = request.quality;

        let report = tokio::task::spawn_blocking(move || {
            encode_sync(&source, &destination, max_dimension, quality)
        })
        .await??;

        Ok(report)
    }
}

fn has_extension(path: &Path, expected: &str) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case(expected))
}

fn encode_sync(
    source: &Path,
    destination: &Path,
    max_dimension: u32,
    quality: u8,
) -> CodecResult<TransformReport> {
    let bytes_in = fs::metadata(source)
        .map_err(|err| CodecError::io("encode.stat_source", source, err))?
        .len();

    let img = image::open(source).map_err(|err| CodecError::Decode {
        path: source.to_path_buf(),
        source: err,
    })?;

    let (width, height) = img.dimensions();
    let resized = width > max_dimension || height > max_dimension;
    let img = if resized {
        debug!(
            path = %source.display(),
            width,
            height,
            max_dimension,
            "downscaling to fit"
        );
        img.resize(max_dimension, max_dimension, FilterType::Triangle)
    } else {
        img
    };

    let rgba = img.to_rgba8();
    let encoded = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
        .encode(f32::from(quality));

    let parent = destination.parent().ok_or_else(|| CodecError::NoParent {
        path: destination.to_path_buf(),
    })?;
    let mut staged = tempfile::NamedTempFile::new_in(parent)
        .map_err(|err| CodecError::io("encode.stage_output", parent, err))?;
    staged
        .write_all(&encoded)
        .map_err(|err| CodecError::io("encode.write_output", staged.path(), err))?;
    staged
        .persist(destination)
        .map_err(|err| CodecError::Publish {
            path: destination.to_path_buf(),
            source: err,
        })?;

    Ok(TransformReport {
        bytes_in,
        bytes_out: encoded.len() as u64,
        width: rgba.width(),
        height: rgba.height(),
        resized,
    })
}
