//! Reconciliation scanner: repairs dropped notifications and prunes
//! leftover directory skeletons.
//!
//! Filesystem-notification delivery is best-effort under load and across
//! mount types, so the scanner re-walks the watch tree at startup and on a
//! fixed interval. Re-enqueueing an already-processed file is cheap: the
//! dispatcher's dedup and skip-existing checks turn the repeat into a
//! no-op.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use snapfold_events::{Event, EventBus};
use snapfold_telemetry::Metrics;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{PipelineError, PipelineResult};
use crate::queue::{Job, WorkQueue};
use crate::resolve::DestinationResolver;

/// Glob patterns for half-written editor and browser droppings that must
/// never enter the pipeline.
const TRANSIENT_PATTERNS: &[&str] = &["**/.*", "**/*.tmp", "**/*.partial", "**/*.crdownload"];

/// Compile the default transient-artifact glob set shared by the watcher
/// and the scanner.
///
/// # Errors
///
/// Returns a [`PipelineError::Glob`] if a pattern fails to compile.
pub fn transient_artifact_globs() -> PipelineResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in TRANSIENT_PATTERNS {
        let glob = Glob::new(pattern).map_err(|source| {
            PipelineError::glob("transient_globs.compile", (*pattern).to_string(), source)
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|source| PipelineError::glob("transient_globs.build", "<set>".to_string(), source))
}

/// Walks the watch tree to seed and repair the work queue.
pub struct Scanner {
    watch_root: PathBuf,
    resolver: DestinationResolver,
    queue: Arc<WorkQueue>,
    ignore: GlobSet,
    events: EventBus,
    metrics: Metrics,
}

impl Scanner {
    /// Construct a scanner over the given roots and shared queue.
    #[must_use]
    pub fn new(
        watch_root: impl Into<PathBuf>,
        resolver: DestinationResolver,
        queue: Arc<WorkQueue>,
        ignore: GlobSet,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        Self {
            watch_root: watch_root.into(),
            resolver,
            queue,
            ignore,
            events,
            metrics,
        }
    }

    /// Walk the watch tree and enqueue a job for every eligible file.
    ///
    /// Returns the number of jobs enqueued. Files that vanish mid-walk or
    /// fail destination resolution are skipped; the next pass revisits
    /// whatever remains.
    pub fn scan(&self) -> usize {
        let mut queued = 0;

        for entry in WalkDir::new(&self.watch_root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(error = %err, "entry disappeared during scan");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if self.ignore.is_match(path) {
                continue;
            }
            let Some(destination) = self.resolver.resolve(path) else {
                debug!(path = %path.display(), "destination unresolved during scan");
                continue;
            };

            self.queue.push(Job {
                source: path.to_path_buf(),
                destination,
            });
            queued += 1;
        }

        self.metrics
            .set_queue_depth(i64::try_from(self.queue.len()).unwrap_or(i64::MAX));
        queued
    }

    /// Remove empty directories below the watch root, deepest first.
    ///
    /// The root itself is never removed. Returns the number of directories
    /// pruned; failures are logged and swallowed.
    pub fn prune_empty_dirs(&self) -> usize {
        let mut removed = 0;

        for entry in WalkDir::new(&self.watch_root)
            .contents_first(true)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_dir() || entry.path() == self.watch_root {
                continue;
            }
            if !is_empty_dir(entry.path()) {
                continue;
            }
            match fs::remove_dir(entry.path()) {
                Ok(()) => {
                    info!(path = %entry.path().display(), "removed empty directory");
                    removed += 1;
                }
                Err(err) => {
                    debug!(
                        path = %entry.path().display(),
                        error = %err,
                        "could not remove directory"
                    );
                }
            }
        }

        self.metrics
            .inc_empty_dirs_removed(u64::try_from(removed).unwrap_or(u64::MAX));
        removed
    }

    /// One full reconciliation pass: re-enqueue every existing file, then
    /// prune empty directories. Returns `(files_queued, dirs_pruned)`.
    pub fn reconcile(&self) -> (usize, usize) {
        let queued = self.scan();
        let pruned = self.prune_empty_dirs();

        self.metrics.inc_scan_run();
        self.metrics
            .set_scan_files_queued(i64::try_from(queued).unwrap_or(i64::MAX));
        let _ = self.events.publish(Event::ScanCompleted {
            queued,
            pruned_dirs: pruned,
        });
        self.metrics.inc_event("scan_completed");

        if queued > 0 {
            info!(queued, pruned, "reconciliation pass found work");
        }
        (queued, pruned)
    }

    /// Run reconciliation passes forever at the given interval.
    ///
    /// Intended to be spawned as a task and aborted on shutdown.
    pub async fn run_periodic(self: Arc<Self>, interval: Duration) {
        info!(interval_secs = interval.as_secs(), "periodic reconciliation started");
        loop {
            tokio::time::sleep(interval).await;
            self.reconcile();
        }
    }
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).map_or(false, |mut entries| entries.next().is_none())
}
