//! Determines whether a file has finished being written.

use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

/// Wait until `path`'s size stops changing, indicating the producing copy
/// has completed.
///
/// Two consecutive probes must agree on a non-zero size. Probes run every
/// `poll_interval`; only the owning task suspends between them.
///
/// # Errors
///
/// Returns [`PipelineError::Unstable`] when the size never settles within
/// `timeout`, or [`PipelineError::Io`] when the file vanishes or cannot be
/// probed. In both cases the file is left in place for the reconciliation
/// scanner to retry.
pub async fn wait_for_stable(
    path: &Path,
    timeout: Duration,
    poll_interval: Duration,
) -> PipelineResult<u64> {
    let deadline = Instant::now() + timeout;
    let mut last_size: Option<u64> = None;

    while Instant::now() < deadline {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| PipelineError::io("stability.probe", path, source))?;
        let current = metadata.len();

        if last_size == Some(current) && current > 0 {
            debug!(path = %path.display(), size = current, "file stable");
            return Ok(current);
        }

        last_size = Some(current);
        tokio::time::sleep(poll_interval).await;
    }

    Err(PipelineError::Unstable {
        path: path.to_path_buf(),
        waited: timeout,
    })
}
