//! Filesystem notification ingestion.
//!
//! # Design
//! - The notify backend is bridged into an unbounded tokio channel so the
//!   OS callback thread never blocks on the scheduler.
//! - Event handling is a free function over injected shared state (dedup
//!   cache, resolver, queue); the handler itself holds nothing mutable.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use snapfold_events::{Event, EventBus};
use snapfold_telemetry::Metrics;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing::{debug, warn};

use crate::dedup::{DedupCache, DedupKey};
use crate::error::{PipelineError, PipelineResult};
use crate::queue::{Job, WorkQueue};
use crate::resolve::DestinationResolver;

/// Normalized notification kinds the pipeline reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    /// A new file appeared.
    Created,
    /// An existing file's contents changed.
    Modified,
}

/// Normalized filesystem notification delivered by the watch subscription.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    /// What happened.
    pub kind: WatchEventKind,
    /// Path the notification refers to.
    pub path: PathBuf,
    /// Whether the path referred to a directory at notification time.
    pub is_directory: bool,
}

/// Live recursive subscription to a watch root.
///
/// Dropping the subscription tears down the underlying OS watch.
pub struct WatchSubscription {
    // Held only to keep the notify backend registered.
    _watcher: RecommendedWatcher,
    receiver: UnboundedReceiver<WatchEvent>,
}

impl WatchSubscription {
    /// Receive the next normalized event, or `None` once the backend has
    /// shut down.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.receiver.recv().await
    }
}

/// Subscribe to recursive change notifications below `root`.
///
/// Delivery is best-effort: the OS layer may drop or duplicate
/// notifications, which is why the reconciliation scanner exists.
///
/// # Errors
///
/// Returns a [`PipelineError::Watch`] if the notify backend cannot be
/// created or the root cannot be watched.
pub fn subscribe(root: &Path) -> PipelineResult<WatchSubscription> {
    let (tx, receiver) = unbounded_channel();

    let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
        match result {
            Ok(event) => {
                let Some(kind) = normalize_kind(&event.kind) else {
                    return;
                };
                for path in event.paths {
                    let is_directory = path.is_dir();
                    // Send failures only occur after the consumer is gone;
                    // the subscription is being torn down at that point.
                    let _ = tx.send(WatchEvent {
                        kind,
                        path,
                        is_directory,
                    });
                }
            }
            Err(err) => warn!(error = %err, "filesystem notification backend error"),
        }
    })
    .map_err(|source| PipelineError::watch("subscribe.create", root, source))?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|source| PipelineError::watch("subscribe.watch", root, source))?;

    Ok(WatchSubscription {
        _watcher: watcher,
        receiver,
    })
}

const fn normalize_kind(kind: &notify::EventKind) -> Option<WatchEventKind> {
    match kind {
        notify::EventKind::Create(_) => Some(WatchEventKind::Created),
        notify::EventKind::Modify(_) => Some(WatchEventKind::Modified),
        _ => None,
    }
}

/// Shared state the event handler closes over.
///
/// Constructed once at wiring time and cloned into the watcher task; the
/// handler function itself is stateless.
#[derive(Clone)]
pub struct WatchContext {
    /// Debounce memo shared with the dispatcher.
    pub cache: Arc<DedupCache>,
    /// Destination policy for notified paths.
    pub resolver: DestinationResolver,
    /// Queue feeding the dispatcher.
    pub queue: Arc<WorkQueue>,
    /// Paths matching these globs are never enqueued.
    pub ignore: globset::GlobSet,
    /// Bus receiving `FileQueued` events.
    pub events: EventBus,
    /// Pipeline metrics handle.
    pub metrics: Metrics,
}

/// Turn one raw notification into at most one queued [`Job`].
///
/// `bucket` is the notification time truncated to whole seconds; events for
/// the same path within the same bucket collapse to a single job. Never
/// blocks and performs no file I/O beyond the resolver's timestamp read.
pub fn handle_event(ctx: &WatchContext, event: &WatchEvent, bucket: i64) {
    if event.is_directory {
        ctx.metrics.inc_watch_event("ignored");
        return;
    }

    if ctx.ignore.is_match(&event.path) {
        debug!(path = %event.path.display(), "transient artifact ignored");
        ctx.metrics.inc_watch_event("ignored");
        return;
    }

    let key = DedupKey::Event {
        bucket,
        path: event.path.clone(),
    };
    if !ctx.cache.observe(key) {
        debug!(path = %event.path.display(), "duplicate notification ignored");
        ctx.metrics.inc_watch_event("duplicate");
        return;
    }

    let Some(destination) = ctx.resolver.resolve(&event.path) else {
        debug!(path = %event.path.display(), "destination unresolved; skipping");
        ctx.metrics.inc_watch_event("ignored");
        return;
    };

    let _ = ctx.events.publish(Event::FileQueued {
        source: event.path.display().to_string(),
        destination: destination.display().to_string(),
    });
    ctx.metrics.inc_event("file_queued");
    ctx.metrics.inc_watch_event("queued");

    ctx.queue.push(Job {
        source: event.path.clone(),
        destination,
    });
    ctx.metrics.set_queue_depth(i64::try_from(ctx.queue.len()).unwrap_or(i64::MAX));
    debug!(path = %event.path.display(), "file queued");
}

/// Drive a subscription until the backend shuts down, feeding each
/// notification through [`handle_event`].
pub async fn run(mut subscription: WatchSubscription, ctx: WatchContext) {
    while let Some(event) = subscription.recv().await {
        handle_event(&ctx, &event, Utc::now().timestamp());
    }
    debug!("watch subscription closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::transient_artifact_globs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn context(watch: &TempDir) -> WatchContext {
        WatchContext {
            cache: Arc::new(DedupCache::new(16, Duration::from_secs(60))),
            resolver: DestinationResolver::new(watch.path(), "/library"),
            queue: Arc::new(WorkQueue::new()),
            ignore: transient_artifact_globs().expect("default globs compile"),
            events: EventBus::with_capacity(16),
            metrics: Metrics::new().expect("metrics registry"),
        }
    }

    fn modified(path: PathBuf) -> WatchEvent {
        WatchEvent {
            kind: WatchEventKind::Modified,
            path,
            is_directory: false,
        }
    }

    #[test]
    fn burst_within_one_bucket_enqueues_once() -> anyhow::Result<()> {
        let watch = TempDir::new()?;
        let source = watch.path().join("photo.jpg");
        std::fs::write(&source, b"jpeg")?;

        let ctx = context(&watch);
        for _ in 0..5 {
            handle_event(&ctx, &modified(source.clone()), 100);
        }

        assert_eq!(ctx.queue.len(), 1);
        Ok(())
    }

    #[test]
    fn distinct_buckets_enqueue_again() -> anyhow::Result<()> {
        let watch = TempDir::new()?;
        let source = watch.path().join("photo.jpg");
        std::fs::write(&source, b"jpeg")?;

        let ctx = context(&watch);
        handle_event(&ctx, &modified(source.clone()), 100);
        handle_event(&ctx, &modified(source.clone()), 101);

        assert_eq!(ctx.queue.len(), 2);
        Ok(())
    }

    #[test]
    fn directories_and_transient_artifacts_are_ignored() -> anyhow::Result<()> {
        let watch = TempDir::new()?;
        let ctx = context(&watch);

        handle_event(
            &ctx,
            &WatchEvent {
                kind: WatchEventKind::Created,
                path: watch.path().join("sub"),
                is_directory: true,
            },
            100,
        );

        let partial = watch.path().join("download.partial");
        std::fs::write(&partial, b"...")?;
        handle_event(&ctx, &modified(partial), 100);

        assert!(ctx.queue.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn subscription_delivers_write_notifications() -> anyhow::Result<()> {
        let watch = TempDir::new()?;
        let mut subscription = subscribe(watch.path())?;

        let source = watch.path().join("photo.jpg");
        std::fs::write(&source, b"jpeg")?;

        let event = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match subscription.recv().await {
                    Some(event) if event.path == source && !event.is_directory => {
                        break Some(event);
                    }
                    Some(_) => {}
                    None => break None,
                }
            }
        })
        .await?;

        assert!(event.is_some(), "expected a notification for the new file");
        Ok(())
    }
}
