//! Typed configuration model for the ingestion pipeline.
//!
//! # Design
//! - Pure data carrier consumed read-only by the pipeline and application.
//! - Keeps parsing and validation in `lib.rs`/`validate.rs`.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Read-only settings consumed by the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Root of the tree watched for dropped files.
    pub watch_root: PathBuf,
    /// Root of the destination library tree.
    pub library_root: PathBuf,
    /// Interval between reconciliation scans.
    pub scan_interval: Duration,
    /// Files smaller than this many bytes are moved, never transformed.
    pub min_transform_bytes: u64,
    /// Longest edge allowed before the codec downscales.
    pub max_dimension: u32,
    /// Codec encoding quality (1-100).
    pub quality: u8,
    /// Maximum number of entries retained by the dedup cache.
    pub dedup_capacity: usize,
    /// Lifetime of a dedup cache entry.
    pub dedup_ttl: Duration,
    /// Upper bound on simultaneous codec invocations.
    pub max_concurrent_transforms: usize,
    /// Whether an already-materialized destination short-circuits processing.
    pub skip_existing: bool,
    /// Longest time to wait for a file's size to settle.
    pub stability_timeout: Duration,
    /// Pause between stability size probes.
    pub stability_poll_interval: Duration,
    /// Tracing filter applied when `RUST_LOG` is unset.
    pub log_level: String,
}

impl fmt::Display for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "watch={} library={} scan_interval={}s min_transform={}B \
             max_dimension={}px quality={} max_concurrent={} skip_existing={}",
            self.watch_root.display(),
            self.library_root.display(),
            self.scan_interval.as_secs(),
            self.min_transform_bytes,
            self.max_dimension,
            self.quality,
            self.max_concurrent_transforms,
            self.skip_existing,
        )
    }
}
