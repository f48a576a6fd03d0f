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

//! Ingestion-and-processing pipeline for the snapfold drop folder.
//!
//! Files land in a watched tree; the pipeline decides per file whether to
//! transform (re-encode to the target codec) or simply relocate, then
//! mirrors the result into the library tree, bucketing root-level drops by
//! modification month. The moving parts:
//!
//! - [`watch`]: normalized filesystem notifications with second-bucket
//!   debouncing.
//! - [`DedupCache`]: time-windowed memo shared by the watcher and
//!   dispatcher.
//! - [`DestinationResolver`]: source path to library path policy.
//! - [`WorkQueue`]: non-blocking buffer between producers and the
//!   dispatcher.
//! - [`Dispatcher`]: batch drain, duplicate collapse, and the per-file
//!   state machine under a bounded permit pool.
//! - [`Scanner`]: startup seeding and periodic repair of missed
//!   notifications, plus empty-directory pruning.
//!
//! The codec is deliberately external: anything implementing [`Codec`]
//! plugs in at wiring time.

mod dedup;
mod dispatch;
mod error;
mod queue;
mod resolve;
mod scan;
mod stability;
pub mod watch;

pub use dedup::{DedupCache, DedupKey};
pub use dispatch::{BatchReport, Codec, Dispatcher, TransformReport, TransformRequest};
pub use error::{PipelineError, PipelineResult};
pub use queue::{Job, WorkQueue};
pub use resolve::DestinationResolver;
pub use scan::{Scanner, transient_artifact_globs};
pub use stability::wait_for_stable;
