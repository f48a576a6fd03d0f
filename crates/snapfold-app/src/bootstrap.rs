//! Service wiring and the cooperative application loop.
//!
//! Startup order follows the recovery contract: a synchronous
//! reconciliation pass seeds and drains the queue before steady-state
//! watching begins, so work pending from a previous run is never
//! stranded behind live notifications.

use std::sync::Arc;
use std::time::Duration;

use snapfold_codec::WebpCodec;
use snapfold_config::IngestConfig;
use snapfold_events::{Event, EventBus};
use snapfold_pipeline::{
    Codec, DedupCache, DestinationResolver, Dispatcher, Scanner, WorkQueue,
    transient_artifact_globs, watch,
};
use snapfold_telemetry::{GlobalContextGuard, LoggingConfig, Metrics};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Pause between dispatcher drain cycles in steady state.
const DRAIN_INTERVAL: Duration = Duration::from_secs(1);

/// Dependencies required to bootstrap the ingestion service.
pub(crate) struct BootstrapDependencies {
    config: IngestConfig,
    events: EventBus,
    telemetry: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the
    /// binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config =
            IngestConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;
        snapfold_config::validate(&config)
            .map_err(|err| AppError::config("config.validate", err))?;

        let events = EventBus::new();
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;

        Ok(Self {
            config,
            events,
            telemetry,
        })
    }
}

/// Entry point for the ingestion service boot sequence.
///
/// # Errors
///
/// Returns an error if dependency construction or application startup
/// fails. Per-file processing failures never surface here; they are
/// retried by reconciliation.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    Box::pin(run_app_with(dependencies)).await
}

/// Boot sequence that relies entirely on injected dependencies to simplify
/// testing.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    let BootstrapDependencies {
        config,
        events,
        telemetry,
    } = dependencies;

    let logging = LoggingConfig {
        level: &config.log_level,
        ..LoggingConfig::default()
    };
    snapfold_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("ingest");

    info!("snapfold ingestion service starting");
    info!(%config, "configuration loaded");
    let concurrency_source = if std::env::var_os("SNAPFOLD_MAX_CONCURRENT_TRANSFORMS").is_some() {
        "configured"
    } else {
        "auto-detected"
    };
    info!(
        max_concurrent = config.max_concurrent_transforms,
        source = concurrency_source,
        "transform concurrency"
    );

    let config = Arc::new(config);
    let queue = Arc::new(WorkQueue::new());
    let cache = Arc::new(DedupCache::new(config.dedup_capacity, config.dedup_ttl));
    let resolver = DestinationResolver::new(&config.watch_root, &config.library_root);
    let ignore =
        transient_artifact_globs().map_err(|err| AppError::pipeline("globs.compile", err))?;
    let codec: Arc<dyn Codec> = Arc::new(WebpCodec::new());

    let dispatcher = Dispatcher::new(
        Arc::clone(&config),
        codec,
        Arc::clone(&queue),
        Arc::clone(&cache),
        events.clone(),
        telemetry.clone(),
    );
    let scanner = Arc::new(Scanner::new(
        &config.watch_root,
        resolver.clone(),
        Arc::clone(&queue),
        ignore.clone(),
        events.clone(),
        telemetry.clone(),
    ));

    // Startup reconciliation: derive all pending work from a full walk and
    // finish it before live notifications join in.
    let seeded = scanner.scan();
    if seeded > 0 {
        info!(seeded, "processing initial backlog");
        let report = dispatcher.drain_and_process().await;
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "initial backlog processed"
        );
    } else {
        info!("no initial files to process");
    }

    let subscription = watch::subscribe(&config.watch_root)
        .map_err(|err| AppError::pipeline("watch.subscribe", err))?;
    let _ = events.publish(Event::WatchStarted {
        root: config.watch_root.display().to_string(),
    });
    telemetry.inc_event("watch_started");

    let watch_ctx = watch::WatchContext {
        cache,
        resolver,
        queue: Arc::clone(&queue),
        ignore,
        events: events.clone(),
        metrics: telemetry.clone(),
    };
    let watcher_task = tokio::spawn(watch::run(subscription, watch_ctx));
    let scanner_task = tokio::spawn(Arc::clone(&scanner).run_periodic(config.scan_interval));

    info!(root = %config.watch_root.display(), "monitoring for file changes");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut drain = tokio::time::interval(DRAIN_INTERVAL);
    drain.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = drain.tick() => {
                let _ = dispatcher.drain_and_process().await;
            }
            () = &mut shutdown => break,
        }
    }

    info!("shutdown signal received");

    watcher_task.abort();
    let _ = watcher_task.await;
    scanner_task.abort();
    let _ = scanner_task.await;

    // In-flight work already ran to completion inside drain_and_process;
    // one final drain covers anything queued since the last tick.
    if !queue.is_empty() {
        info!(remaining = queue.len(), "processing remaining files");
        let report = dispatcher.drain_and_process().await;
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "final drain complete"
        );
    }

    info!("shutdown complete");
    Ok(())
}

/// Resolve once SIGINT or SIGTERM is delivered.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                if let Err(err) = tokio::signal::ctrl_c().await {
                    warn!(error = %err, "failed to listen for ctrl-c");
                }
                return;
            }
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    warn!(error = %err, "failed to listen for ctrl-c");
                }
            }
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
        }
    }
}
