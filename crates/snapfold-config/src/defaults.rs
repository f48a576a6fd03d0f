//! Default values for tunable pipeline settings.
//!
//! # Design
//! - Centralize defaults so the loader, documentation, and tests stay
//!   consistent.
//! - Keep time-based defaults explicit for auditability.

/// Seconds between reconciliation scans of the watch root.
pub(crate) const SCAN_INTERVAL_SECONDS: u64 = 60;
/// Files below this many KiB are relocated without transformation.
pub(crate) const MIN_TRANSFORM_KIB: u64 = 1024;
/// Longest edge allowed before the codec downscales an image.
pub(crate) const MAX_DIMENSION: u32 = 1920;
/// WebP encoding quality (1-100).
pub(crate) const QUALITY: u8 = 90;
/// Maximum number of entries retained by the dedup cache.
pub(crate) const DEDUP_CAPACITY: usize = 100;
/// Seconds a dedup cache entry stays live.
pub(crate) const DEDUP_TTL_SECONDS: u64 = 60;
/// Whether already-materialized destinations short-circuit processing.
pub(crate) const SKIP_EXISTING: bool = true;
/// Seconds to wait for a file's size to settle before giving up.
pub(crate) const STABILITY_TIMEOUT_SECONDS: u64 = 10;
/// Milliseconds between stability size probes.
pub(crate) const STABILITY_POLL_MS: u64 = 500;
/// Default tracing filter when `SNAPFOLD_LOG_LEVEL` and `RUST_LOG` are unset.
pub(crate) const LOG_LEVEL: &str = "info";
