//! Telemetry primitives shared across the snapfold workspace.
//!
//! This crate centralises logging and metrics helpers so the pipeline and
//! the application binary adopt a consistent observability story.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use once_cell::sync::OnceCell;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;
use tracing::{Span, span::Entered};
use tracing_subscriber::{EnvFilter, fmt};

/// Default logging target when `RUST_LOG` is not provided.
const DEFAULT_LOG_LEVEL: &str = "info";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Configure and install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the tracing subscriber cannot be installed (for
/// example, because another subscriber has already been set globally).
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let _ = BUILD_SHA.set(config.build_sha.to_string());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level));

    let install = |format: LogFormat| {
        let builder = fmt::fmt()
            .with_env_filter(env_filter.clone())
            .with_target(false)
            .with_thread_ids(false);

        match format {
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        }
    };

    install(config.format).map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;

    Ok(())
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    pub level: &'a str,
    pub format: LogFormat,
    pub build_sha: &'a str,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            build_sha: build_sha(),
        }
    }
}

/// Available output formats for the logger.
#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// Choose a sensible default for the current build.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Guard that keeps the application-level span entered for the lifetime of
/// the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    #[must_use]
    pub fn new(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("app", mode = %mode, build_sha = %build_sha()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Access the build SHA recorded during logging initialisation.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

/// Prometheus-backed metrics registry shared across the pipeline.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    watch_events_total: IntCounterVec,
    files_processed_total: IntCounterVec,
    codec_transforms_total: IntCounterVec,
    events_emitted_total: IntCounterVec,
    batches_total: IntCounter,
    queue_depth: IntGauge,
    scan_runs_total: IntCounter,
    scan_files_queued: IntGauge,
    empty_dirs_removed_total: IntCounter,
    stability_timeouts_total: IntCounter,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub queue_depth: i64,
    pub batches_total: u64,
    pub scan_runs_total: u64,
    pub scan_files_queued: i64,
    pub empty_dirs_removed_total: u64,
    pub stability_timeouts_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let watch_events_total = IntCounterVec::new(
            Opts::new(
                "watch_events_total",
                "Filesystem notifications received by disposition",
            ),
            &["disposition"],
        )?;
        let files_processed_total = IntCounterVec::new(
            Opts::new("files_processed_total", "Files processed by outcome"),
            &["outcome"],
        )?;
        let codec_transforms_total = IntCounterVec::new(
            Opts::new("codec_transforms_total", "Codec invocations by status"),
            &["status"],
        )?;
        let events_emitted_total = IntCounterVec::new(
            Opts::new("events_emitted_total", "Domain events emitted by type"),
            &["type"],
        )?;
        let batches_total =
            IntCounter::with_opts(Opts::new("batches_total", "Dispatcher drain cycles executed"))?;
        let queue_depth =
            IntGauge::with_opts(Opts::new("queue_depth", "Jobs buffered in the work queue"))?;
        let scan_runs_total = IntCounter::with_opts(Opts::new(
            "scan_runs_total",
            "Reconciliation scans completed",
        ))?;
        let scan_files_queued = IntGauge::with_opts(Opts::new(
            "scan_files_queued",
            "Files enqueued by the most recent reconciliation scan",
        ))?;
        let empty_dirs_removed_total = IntCounter::with_opts(Opts::new(
            "empty_dirs_removed_total",
            "Empty directories pruned from the watch tree",
        ))?;
        let stability_timeouts_total = IntCounter::with_opts(Opts::new(
            "stability_timeouts_total",
            "Files that never stabilised within the configured window",
        ))?;

        registry.register(Box::new(watch_events_total.clone()))?;
        registry.register(Box::new(files_processed_total.clone()))?;
        registry.register(Box::new(codec_transforms_total.clone()))?;
        registry.register(Box::new(events_emitted_total.clone()))?;
        registry.register(Box::new(batches_total.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(scan_runs_total.clone()))?;
        registry.register(Box::new(scan_files_queued.clone()))?;
        registry.register(Box::new(empty_dirs_removed_total.clone()))?;
        registry.register(Box::new(stability_timeouts_total.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                watch_events_total,
                files_processed_total,
                codec_transforms_total,
                events_emitted_total,
                batches_total,
                queue_depth,
                scan_runs_total,
                scan_files_queued,
                empty_dirs_removed_total,
                stability_timeouts_total,
            }),
        })
    }

    /// Increment the watch event counter for the given disposition.
    pub fn inc_watch_event(&self, disposition: &str) {
        self.inner
            .watch_events_total
            .with_label_values(&[disposition])
            .inc();
    }

    /// Increment the processed-file counter for the given outcome.
    pub fn inc_file_processed(&self, outcome: &str) {
        self.inner
            .files_processed_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Increment the codec invocation counter for the given status.
    pub fn inc_codec_transform(&self, status: &str) {
        self.inner
            .codec_transforms_total
            .with_label_values(&[status])
            .inc();
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Record one dispatcher drain cycle.
    pub fn inc_batch(&self) {
        self.inner.batches_total.inc();
    }

    /// Set the work-queue depth gauge.
    pub fn set_queue_depth(&self, depth: i64) {
        self.inner.queue_depth.set(depth);
    }

    /// Record one completed reconciliation scan.
    pub fn inc_scan_run(&self) {
        self.inner.scan_runs_total.inc();
    }

    /// Record how many files the most recent scan enqueued.
    pub fn set_scan_files_queued(&self, count: i64) {
        self.inner.scan_files_queued.set(count);
    }

    /// Record pruned empty directories.
    pub fn inc_empty_dirs_removed(&self, count: u64) {
        self.inner.empty_dirs_removed_total.inc_by(count);
    }

    /// Record a file that never stabilised within the configured window.
    pub fn inc_stability_timeout(&self) {
        self.inner.stability_timeouts_total.inc();
    }

    /// Render the metrics registry using the Prometheus text exposition
    /// format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Take a point-in-time snapshot of the most relevant gauges and
    /// counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_depth: self.inner.queue_depth.get(),
            batches_total: self.inner.batches_total.get(),
            scan_runs_total: self.inner.scan_runs_total.get(),
            scan_files_queued: self.inner.scan_files_queued.get(),
            empty_dirs_removed_total: self.inner.empty_dirs_removed_total.get(),
            stability_timeouts_total: self.inner.stability_timeouts_total.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_and_render() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_watch_event("queued");
        metrics.inc_file_processed("transformed");
        metrics.inc_codec_transform("ok");
        metrics.inc_event("file_queued");
        metrics.inc_batch();
        metrics.set_queue_depth(3);
        metrics.inc_scan_run();
        metrics.set_scan_files_queued(7);
        metrics.inc_empty_dirs_removed(2);
        metrics.inc_stability_timeout();

        let rendered = metrics.render()?;
        assert!(rendered.contains("watch_events_total"));
        assert!(rendered.contains("files_processed_total"));
        assert!(rendered.contains("codec_transforms_total"));
        Ok(())
    }

    #[test]
    fn snapshot_reflects_recorded_values() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.set_queue_depth(5);
        metrics.inc_batch();
        metrics.inc_scan_run();
        metrics.set_scan_files_queued(11);
        metrics.inc_empty_dirs_removed(4);
        metrics.inc_stability_timeout();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.queue_depth, 5);
        assert_eq!(snapshot.batches_total, 1);
        assert_eq!(snapshot.scan_runs_total, 1);
        assert_eq!(snapshot.scan_files_queued, 11);
        assert_eq!(snapshot.empty_dirs_removed_total, 4);
        assert_eq!(snapshot.stability_timeouts_total, 1);
        Ok(())
    }
}
