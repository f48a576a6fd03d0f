//! Drains the work queue and drives each file through the processing state
//! machine.
//!
//! # Design
//! - One drain takes every buffered job, collapses duplicates by source
//!   path (last destination wins), and processes the survivors
//!   concurrently under a shared permit pool.
//! - Every per-file failure is contained: the batch reports aggregate
//!   counts and the reconciliation scanner retries whatever was left
//!   behind.
//! - The codec is an injected capability; which implementation (and which
//!   executor behind it) runs is decided at wiring time.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use snapfold_config::IngestConfig;
use snapfold_events::{Disposition, Event, EventBus};
use snapfold_telemetry::Metrics;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dedup::{DedupCache, DedupKey};
use crate::error::{PipelineError, PipelineResult};
use crate::queue::{Job, WorkQueue};
use crate::stability::wait_for_stable;

/// Immutable inputs handed to the codec for one transformation.
#[derive(Copy, Clone)]
pub struct TransformRequest<'a> {
    /// Stable source file to re-encode.
    pub source: &'a Path,
    /// Exact path the encoded output must appear at.
    pub destination: &'a Path,
    /// Longest edge allowed before downscaling.
    pub max_dimension: u32,
    /// Encoding quality (1-100).
    pub quality: u8,
}

/// Statistics reported by a successful transformation.
#[derive(Debug, Clone, Copy)]
pub struct TransformReport {
    /// Size of the source file in bytes.
    pub bytes_in: u64,
    /// Size of the encoded output in bytes.
    pub bytes_out: u64,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Whether the image was downscaled to fit `max_dimension`.
    pub resized: bool,
}

/// Boundary to the image re-encoding collaborator.
///
/// Implementations must validate the input format, resize only when a
/// dimension exceeds the requested maximum (preserving aspect ratio),
/// write output atomically enough that a reader never observes a truncated
/// file, and report failure as an error rather than panicking.
#[async_trait]
pub trait Codec: Send + Sync {
    /// Whether `path` already carries the codec's output format, making a
    /// transformation pointless.
    fn is_target_format(&self, path: &Path) -> bool;

    /// Whether `path` is an input format this codec can decode.
    fn is_supported_input(&self, path: &Path) -> bool;

    /// The path the transformed variant of `destination` would occupy.
    fn transformed_destination(&self, destination: &Path) -> PathBuf;

    /// Re-encode `request.source` into `request.destination`.
    async fn transform(&self, request: TransformRequest<'_>) -> anyhow::Result<TransformReport>;
}

/// Aggregate outcome of one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Jobs that reached a terminal success state.
    pub succeeded: usize,
    /// Jobs that failed and were left for reconciliation.
    pub failed: usize,
}

/// Batch dispatcher owning the per-file processing state machine.
#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<IngestConfig>,
    codec: Arc<dyn Codec>,
    queue: Arc<WorkQueue>,
    cache: Arc<DedupCache>,
    events: EventBus,
    metrics: Metrics,
    permits: Arc<Semaphore>,
    health_degraded: Arc<Mutex<bool>>,
}

impl Dispatcher {
    /// Construct a dispatcher over the shared queue and dedup cache.
    #[must_use]
    pub fn new(
        config: Arc<IngestConfig>,
        codec: Arc<dyn Codec>,
        queue: Arc<WorkQueue>,
        cache: Arc<DedupCache>,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_transforms));
        Self {
            config,
            codec,
            queue,
            cache,
            events,
            metrics,
            permits,
            health_degraded: Arc::new(Mutex::new(false)),
        }
    }

    /// Atomically take every queued job, collapse duplicates, and process
    /// the survivors under the permit pool.
    ///
    /// Per-file failures never escape; they are folded into the returned
    /// [`BatchReport`].
    pub async fn drain_and_process(&self) -> BatchReport {
        let drained = self.queue.drain();
        self.metrics.set_queue_depth(0);
        if drained.is_empty() {
            return BatchReport::default();
        }

        let jobs = collapse_by_source(drained);
        let batch_id = Uuid::new_v4();
        self.publish(Event::BatchStarted {
            batch_id,
            jobs: jobs.len(),
        });
        self.metrics.inc_batch();
        info!(batch = %batch_id, jobs = jobs.len(), "processing batch");

        let mut tasks = JoinSet::new();
        for job in jobs {
            let dispatcher = self.clone();
            tasks.spawn(async move {
                let source = job.source.clone();
                let result = dispatcher.process_job(job).await;
                (source, result)
            });
        }

        let mut report = BatchReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((source, Ok(disposition))) => {
                    report.succeeded += 1;
                    self.publish(Event::FileProcessed {
                        source: source.display().to_string(),
                        disposition,
                    });
                    self.metrics.inc_file_processed(disposition.as_str());
                }
                Ok((source, Err(err))) => {
                    report.failed += 1;
                    let message = render_chain(&err);
                    warn!(path = %source.display(), error = %message, "file processing failed");
                    self.publish(Event::FileFailed {
                        source: source.display().to_string(),
                        message,
                    });
                    self.metrics.inc_file_processed("failed");
                }
                Err(join_err) => {
                    report.failed += 1;
                    error!(error = %join_err, "processing task aborted");
                    self.metrics.inc_file_processed("failed");
                }
            }
        }

        self.publish(Event::BatchCompleted {
            batch_id,
            succeeded: report.succeeded,
            failed: report.failed,
        });
        info!(
            batch = %batch_id,
            succeeded = report.succeeded,
            failed = report.failed,
            "batch complete"
        );

        if report.failed > 0 {
            self.mark_degraded();
        } else {
            self.mark_recovered();
        }
        report
    }

    /// Drive one job through the state machine to a terminal state.
    async fn process_job(&self, job: Job) -> PipelineResult<Disposition> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| PipelineError::Shutdown {
                operation: "permits.acquire",
            })?;

        debug!(path = %job.source.display(), "processing");

        // A vanished source means a previous attempt (or the user) already
        // consumed it; a directory is nothing to process.
        if !job.source.exists() || job.source.is_dir() {
            return Ok(Disposition::Skipped);
        }

        let transformed = self.codec.transformed_destination(&job.destination);
        if self.config.skip_existing
            && (job.destination.exists() || transformed.exists())
        {
            debug!(path = %job.destination.display(), "destination exists; dropping source");
            remove_source(&job.source)?;
            return Ok(Disposition::Skipped);
        }

        let size = match wait_for_stable(
            &job.source,
            self.config.stability_timeout,
            self.config.stability_poll_interval,
        )
        .await
        {
            Ok(size) => size,
            Err(err) => {
                if matches!(err, PipelineError::Unstable { .. }) {
                    self.metrics.inc_stability_timeout();
                }
                return Err(err);
            }
        };

        if let Some(parent) = job.destination.parent()
            && !parent.exists()
        {
            info!(path = %parent.display(), "creating destination directory");
            fs::create_dir_all(parent)
                .map_err(|source| PipelineError::io("process.create_dest_dir", parent, source))?;
        }

        if self.codec.is_target_format(&job.source) {
            debug!(path = %job.source.display(), "already target format; relocating");
            relocate(&job.source, &job.destination)?;
            self.cleanup_parent(&job.source);
            return Ok(Disposition::Moved);
        }

        if size < self.config.min_transform_bytes || !self.codec.is_supported_input(&job.source) {
            info!(
                path = %job.source.display(),
                size,
                "relocating without transformation"
            );
            relocate(&job.source, &job.destination)?;
            self.cleanup_parent(&job.source);
            return Ok(Disposition::Moved);
        }

        self.run_transform(&job, &transformed, size).await
    }

    /// Invoke the codec under the operation-level dedup guard.
    async fn run_transform(
        &self,
        job: &Job,
        transformed: &Path,
        bytes_in: u64,
    ) -> PipelineResult<Disposition> {
        let operation_key = DedupKey::Operation {
            source: job.source.clone(),
            destination: job.destination.clone(),
        };
        if !self.cache.observe(operation_key) {
            debug!(path = %job.source.display(), "transform already handled; skipping");
            return Ok(Disposition::Skipped);
        }

        let request = TransformRequest {
            source: &job.source,
            destination: transformed,
            max_dimension: self.config.max_dimension,
            quality: self.config.quality,
        };

        match self.codec.transform(request).await {
            Ok(result) => {
                self.metrics.inc_codec_transform("ok");
                let saved_percent = 100_u64
                    .saturating_sub(result.bytes_out.saturating_mul(100) / bytes_in.max(1));
                info!(
                    path = %job.source.display(),
                    bytes_in,
                    bytes_out = result.bytes_out,
                    saved_percent,
                    resized = result.resized,
                    "transformed"
                );
                remove_source(&job.source)?;
                self.cleanup_parent(&job.source);
                Ok(Disposition::Transformed)
            }
            Err(err) => {
                self.metrics.inc_codec_transform("error");
                Err(PipelineError::Codec {
                    path: job.source.clone(),
                    message: format!("{err:#}"),
                })
            }
        }
    }

    /// Remove the source's parent directory when it is now empty and is not
    /// the watch root. Best-effort: failures are logged and swallowed.
    fn cleanup_parent(&self, source: &Path) {
        let Some(parent) = source.parent() else {
            return;
        };
        if normalize(parent) == normalize(&self.config.watch_root) {
            return;
        }

        let is_empty = fs::read_dir(parent).map_or(false, |mut entries| entries.next().is_none());
        if !is_empty {
            return;
        }
        match fs::remove_dir(parent) {
            Ok(()) => info!(path = %parent.display(), "removed empty directory"),
            Err(err) => {
                debug!(path = %parent.display(), error = %err, "could not remove directory");
            }
        }
    }

    fn publish(&self, event: Event) {
        let kind = event.kind();
        let _ = self.events.publish(event);
        self.metrics.inc_event(kind);
    }

    fn mark_degraded(&self) {
        let mut guard = self
            .health_degraded
            .lock()
            .expect("health flag mutex poisoned");
        if *guard {
            return;
        }
        *guard = true;
        drop(guard);
        self.publish(Event::HealthChanged {
            degraded: vec!["pipeline".to_string()],
        });
        warn!("pipeline degraded; failed files will be retried by reconciliation");
    }

    fn mark_recovered(&self) {
        let mut guard = self
            .health_degraded
            .lock()
            .expect("health flag mutex poisoned");
        if std::mem::take(&mut *guard) {
            drop(guard);
            self.publish(Event::HealthChanged { degraded: vec![] });
            info!("pipeline recovered");
        }
    }
}

/// Collapse duplicate jobs for the same source path, keeping the last
/// destination seen and the order of first appearance.
fn collapse_by_source(jobs: Vec<Job>) -> Vec<Job> {
    let mut order: Vec<PathBuf> = Vec::new();
    let mut latest: HashMap<PathBuf, PathBuf> = HashMap::new();
    for job in jobs {
        if !latest.contains_key(&job.source) {
            order.push(job.source.clone());
        }
        latest.insert(job.source, job.destination);
    }
    order
        .into_iter()
        .filter_map(|source| {
            latest.remove(&source).map(|destination| Job {
                source,
                destination,
            })
        })
        .collect()
}

/// Rename with a copy-then-remove fallback for cross-device moves.
fn relocate(source: &Path, destination: &Path) -> PipelineResult<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(_rename_err) => {
            fs::copy(source, destination)
                .map_err(|err| PipelineError::io("relocate.copy", destination, err))?;
            if let Err(err) = fs::remove_file(source)
                && err.kind() != std::io::ErrorKind::NotFound
            {
                return Err(PipelineError::io("relocate.cleanup", source, err));
            }
            Ok(())
        }
    }
}

/// Remove a consumed source file, tolerating a concurrent removal.
fn remove_source(source: &Path) -> PipelineResult<()> {
    match fs::remove_file(source) {
        Ok(()) => {
            debug!(path = %source.display(), "removed source");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %source.display(), "source already removed");
            Ok(())
        }
        Err(err) => Err(PipelineError::io("process.remove_source", source, err)),
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn render_chain(err: &PipelineError) -> String {
    use std::error::Error;
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
