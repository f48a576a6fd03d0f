//! Semantic validation applied after configuration values are parsed.

use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::model::IngestConfig;

/// Validate an [`IngestConfig`] against the pipeline's operating
/// requirements.
///
/// # Errors
///
/// Returns the first [`ConfigError::InvalidField`] encountered. Both roots
/// must exist as directories, must be distinct, and must not nest inside
/// one another (a watched destination would feed its own output back into
/// the pipeline).
pub fn validate(config: &IngestConfig) -> ConfigResult<()> {
    ensure_directory("watch_root", &config.watch_root)?;
    ensure_directory("library_root", &config.library_root)?;

    if paths_overlap(&config.watch_root, &config.library_root) {
        return Err(ConfigError::InvalidField {
            field: "library_root",
            reason: "overlaps watch_root",
            value: Some(config.library_root.display().to_string()),
        });
    }

    if config.scan_interval.is_zero() {
        return Err(ConfigError::InvalidField {
            field: "scan_interval",
            reason: "must be positive",
            value: None,
        });
    }

    if config.quality == 0 || config.quality > 100 {
        return Err(ConfigError::InvalidField {
            field: "quality",
            reason: "must be between 1 and 100",
            value: Some(config.quality.to_string()),
        });
    }

    if config.max_dimension == 0 {
        return Err(ConfigError::InvalidField {
            field: "max_dimension",
            reason: "must be positive",
            value: None,
        });
    }

    if config.max_concurrent_transforms == 0 {
        return Err(ConfigError::InvalidField {
            field: "max_concurrent_transforms",
            reason: "must be positive",
            value: None,
        });
    }

    if config.dedup_capacity == 0 {
        return Err(ConfigError::InvalidField {
            field: "dedup_capacity",
            reason: "must be positive",
            value: None,
        });
    }

    if config.dedup_ttl.is_zero() {
        return Err(ConfigError::InvalidField {
            field: "dedup_ttl",
            reason: "must be positive",
            value: None,
        });
    }

    if config.stability_poll_interval.is_zero()
        || config.stability_poll_interval >= config.stability_timeout
    {
        return Err(ConfigError::InvalidField {
            field: "stability_poll_interval",
            reason: "must be positive and shorter than stability_timeout",
            value: None,
        });
    }

    Ok(())
}

fn ensure_directory(field: &'static str, path: &Path) -> ConfigResult<()> {
    if !path.is_dir() {
        return Err(ConfigError::InvalidField {
            field,
            reason: "must be an existing directory",
            value: Some(path.display().to_string()),
        });
    }
    Ok(())
}

/// Two roots overlap when they are equal or one contains the other.
fn paths_overlap(left: &Path, right: &Path) -> bool {
    let left = left.canonicalize().unwrap_or_else(|_| left.to_path_buf());
    let right = right.canonicalize().unwrap_or_else(|_| right.to_path_buf());
    left.starts_with(&right) || right.starts_with(&left)
}
