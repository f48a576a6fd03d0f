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

//! Environment-backed configuration for the snapfold ingestion pipeline.
//!
//! # Design
//! - `IngestConfig` is a read-only snapshot handed to every component.
//! - Values come from `SNAPFOLD_*` environment variables, optionally seeded
//!   from a `.env` file; parsing and semantic validation are separate
//!   stages so tests can exercise each in isolation.

mod defaults;
mod error;
mod model;
mod validate;

use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigError, ConfigResult};
pub use model::IngestConfig;
pub use validate::validate;

const WATCH_ROOT: &str = "SNAPFOLD_WATCH_ROOT";
const LIBRARY_ROOT: &str = "SNAPFOLD_LIBRARY_ROOT";
const SCAN_INTERVAL_SECONDS: &str = "SNAPFOLD_SCAN_INTERVAL_SECONDS";
const MIN_TRANSFORM_KIB: &str = "SNAPFOLD_MIN_TRANSFORM_KIB";
const MAX_DIMENSION: &str = "SNAPFOLD_MAX_DIMENSION";
const QUALITY: &str = "SNAPFOLD_QUALITY";
const DEDUP_CAPACITY: &str = "SNAPFOLD_DEDUP_CAPACITY";
const DEDUP_TTL_SECONDS: &str = "SNAPFOLD_DEDUP_TTL_SECONDS";
const MAX_CONCURRENT_TRANSFORMS: &str = "SNAPFOLD_MAX_CONCURRENT_TRANSFORMS";
const SKIP_EXISTING: &str = "SNAPFOLD_SKIP_EXISTING";
const STABILITY_TIMEOUT_SECONDS: &str = "SNAPFOLD_STABILITY_TIMEOUT_SECONDS";
const STABILITY_POLL_MS: &str = "SNAPFOLD_STABILITY_POLL_MS";
const LOG_LEVEL: &str = "SNAPFOLD_LOG_LEVEL";

impl IngestConfig {
    /// Load configuration from the process environment, seeding it from a
    /// `.env` file in the working directory when one exists.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a required variable is missing or a
    /// value fails to parse. Semantic checks live in [`validate`] and are
    /// not applied here.
    pub fn from_env() -> ConfigResult<Self> {
        // A missing .env file is the common case in production; only a
        // present-but-unreadable file is worth surfacing.
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            tracing::warn!(error = %err, "failed to read .env file");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// The binary goes through [`IngestConfig::from_env`]; tests inject a
    /// map-backed lookup to avoid mutating process-global state.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a required variable is missing or a
    /// value fails to parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let watch_root = require(&lookup, WATCH_ROOT)?;
        let library_root = require(&lookup, LIBRARY_ROOT)?;

        Ok(Self {
            watch_root: PathBuf::from(watch_root),
            library_root: PathBuf::from(library_root),
            scan_interval: Duration::from_secs(parse_u64(
                &lookup,
                SCAN_INTERVAL_SECONDS,
                defaults::SCAN_INTERVAL_SECONDS,
            )?),
            min_transform_bytes: parse_u64(&lookup, MIN_TRANSFORM_KIB, defaults::MIN_TRANSFORM_KIB)?
                .saturating_mul(1024),
            max_dimension: parse_u32(&lookup, MAX_DIMENSION, defaults::MAX_DIMENSION)?,
            quality: parse_u8(&lookup, QUALITY, defaults::QUALITY)?,
            dedup_capacity: parse_usize(&lookup, DEDUP_CAPACITY, defaults::DEDUP_CAPACITY)?,
            dedup_ttl: Duration::from_secs(parse_u64(
                &lookup,
                DEDUP_TTL_SECONDS,
                defaults::DEDUP_TTL_SECONDS,
            )?),
            max_concurrent_transforms: parse_usize(
                &lookup,
                MAX_CONCURRENT_TRANSFORMS,
                default_parallelism(),
            )?,
            skip_existing: parse_flag(&lookup, SKIP_EXISTING, defaults::SKIP_EXISTING),
            stability_timeout: Duration::from_secs(parse_u64(
                &lookup,
                STABILITY_TIMEOUT_SECONDS,
                defaults::STABILITY_TIMEOUT_SECONDS,
            )?),
            stability_poll_interval: Duration::from_millis(parse_u64(
                &lookup,
                STABILITY_POLL_MS,
                defaults::STABILITY_POLL_MS,
            )?),
            log_level: lookup(LOG_LEVEL).unwrap_or_else(|| defaults::LOG_LEVEL.to_string()),
        })
    }
}

/// Concurrency default when the operator does not set one explicitly.
fn default_parallelism() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

fn require(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> ConfigResult<String> {
    lookup(name)
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::MissingVar { name })
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> ConfigResult<u64> {
    parse_with(lookup, name, default, str::parse::<u64>)
}

fn parse_u32(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u32,
) -> ConfigResult<u32> {
    parse_with(lookup, name, default, str::parse::<u32>)
}

fn parse_u8(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u8,
) -> ConfigResult<u8> {
    parse_with(lookup, name, default, str::parse::<u8>)
}

fn parse_usize(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: usize,
) -> ConfigResult<usize> {
    parse_with(lookup, name, default, str::parse::<usize>)
}

fn parse_with<T, E>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
    parse: impl Fn(&str) -> Result<T, E>,
) -> ConfigResult<T> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => parse(raw.trim()).map_err(|_| ConfigError::InvalidVar {
            name,
            value: raw,
            reason: "must be a non-negative integer",
        }),
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: bool) -> bool {
    lookup(name).map_or(default, |value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
        }
    }

    #[test]
    fn defaults_apply_when_only_roots_are_set() {
        let config = IngestConfig::from_lookup(lookup_from(&[
            (WATCH_ROOT, "/data/drop"),
            (LIBRARY_ROOT, "/data/library"),
        ]))
        .expect("roots alone should be sufficient");

        assert_eq!(config.scan_interval, Duration::from_secs(60));
        assert_eq!(config.min_transform_bytes, 1024 * 1024);
        assert_eq!(config.max_dimension, 1920);
        assert_eq!(config.quality, 90);
        assert!(config.skip_existing);
        assert_eq!(config.stability_poll_interval, Duration::from_millis(500));
        assert!(config.max_concurrent_transforms > 0);
    }

    #[test]
    fn missing_root_is_reported_by_name() {
        let err = IngestConfig::from_lookup(lookup_from(&[(WATCH_ROOT, "/data/drop")]))
            .expect_err("library root is required");
        assert!(matches!(
            err,
            ConfigError::MissingVar {
                name: "SNAPFOLD_LIBRARY_ROOT"
            }
        ));
    }

    #[test]
    fn blank_required_value_counts_as_missing() {
        let err = IngestConfig::from_lookup(lookup_from(&[
            (WATCH_ROOT, "   "),
            (LIBRARY_ROOT, "/data/library"),
        ]))
        .expect_err("blank watch root should be rejected");
        assert!(matches!(err, ConfigError::MissingVar { .. }));
    }

    #[test]
    fn malformed_integer_is_rejected_with_context() {
        let err = IngestConfig::from_lookup(lookup_from(&[
            (WATCH_ROOT, "/data/drop"),
            (LIBRARY_ROOT, "/data/library"),
            (MIN_TRANSFORM_KIB, "lots"),
        ]))
        .expect_err("non-numeric threshold should be rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidVar {
                name: "SNAPFOLD_MIN_TRANSFORM_KIB",
                ..
            }
        ));
    }

    #[test]
    fn flag_parsing_accepts_truthy_spellings() {
        for truthy in ["1", "true", "YES", " on "] {
            let config = IngestConfig::from_lookup(lookup_from(&[
                (WATCH_ROOT, "/data/drop"),
                (LIBRARY_ROOT, "/data/library"),
                (SKIP_EXISTING, truthy),
            ]))
            .expect("config should load");
            assert!(config.skip_existing, "{truthy:?} should enable the flag");
        }

        let config = IngestConfig::from_lookup(lookup_from(&[
            (WATCH_ROOT, "/data/drop"),
            (LIBRARY_ROOT, "/data/library"),
            (SKIP_EXISTING, "no"),
        ]))
        .expect("config should load");
        assert!(!config.skip_existing);
    }
}
