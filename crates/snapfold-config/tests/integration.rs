use std::time::Duration;

use snapfold_config::{ConfigError, IngestConfig, validate};
use tempfile::TempDir;

fn config_for(watch: &TempDir, library: &TempDir) -> IngestConfig {
    IngestConfig {
        watch_root: watch.path().to_path_buf(),
        library_root: library.path().to_path_buf(),
        scan_interval: Duration::from_secs(60),
        min_transform_bytes: 1024 * 1024,
        max_dimension: 1920,
        quality: 90,
        dedup_capacity: 100,
        dedup_ttl: Duration::from_secs(60),
        max_concurrent_transforms: 4,
        skip_existing: true,
        stability_timeout: Duration::from_secs(10),
        stability_poll_interval: Duration::from_millis(500),
        log_level: "info".to_string(),
    }
}

#[test]
fn validation_accepts_disjoint_directories() -> anyhow::Result<()> {
    let watch = TempDir::new()?;
    let library = TempDir::new()?;
    validate(&config_for(&watch, &library))?;
    Ok(())
}

#[test]
fn validation_rejects_missing_watch_root() -> anyhow::Result<()> {
    let watch = TempDir::new()?;
    let library = TempDir::new()?;
    let mut config = config_for(&watch, &library);
    config.watch_root = watch.path().join("does-not-exist");

    let err = validate(&config).expect_err("absent watch root should fail validation");
    assert!(matches!(
        err,
        ConfigError::InvalidField {
            field: "watch_root",
            ..
        }
    ));
    Ok(())
}

#[test]
fn validation_rejects_library_nested_in_watch_root() -> anyhow::Result<()> {
    let watch = TempDir::new()?;
    let library = watch.path().join("library");
    std::fs::create_dir(&library)?;

    let other = TempDir::new()?;
    let mut config = config_for(&watch, &other);
    config.library_root = library;

    let err = validate(&config).expect_err("nested library root should fail validation");
    assert!(matches!(
        err,
        ConfigError::InvalidField {
            field: "library_root",
            reason: "overlaps watch_root",
            ..
        }
    ));
    Ok(())
}

#[test]
fn validation_rejects_out_of_range_quality() -> anyhow::Result<()> {
    let watch = TempDir::new()?;
    let library = TempDir::new()?;
    let mut config = config_for(&watch, &library);
    config.quality = 0;

    let err = validate(&config).expect_err("zero quality should fail validation");
    assert!(matches!(
        err,
        ConfigError::InvalidField {
            field: "quality",
            ..
        }
    ));
    Ok(())
}

#[test]
fn validation_rejects_poll_interval_longer_than_timeout() -> anyhow::Result<()> {
    let watch = TempDir::new()?;
    let library = TempDir::new()?;
    let mut config = config_for(&watch, &library);
    config.stability_poll_interval = Duration::from_secs(30);

    let err = validate(&config).expect_err("oversized poll interval should fail validation");
    assert!(matches!(
        err,
        ConfigError::InvalidField {
            field: "stability_poll_interval",
            ..
        }
    ));
    Ok(())
}
