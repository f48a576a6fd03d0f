//! Maps source paths to their destination under the organizing policy.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

/// Resolves where a watched file should land in the library tree.
///
/// Files sitting directly at the top of the watch tree are bucketed into
/// `YYYY-MM` subdirectories derived from their last-modified timestamp;
/// nested files keep their caller-supplied structure and are mirrored
/// verbatim.
#[derive(Debug, Clone)]
pub struct DestinationResolver {
    watch_root: PathBuf,
    library_root: PathBuf,
}

impl DestinationResolver {
    /// Construct a resolver for the given roots.
    #[must_use]
    pub fn new(watch_root: impl Into<PathBuf>, library_root: impl Into<PathBuf>) -> Self {
        Self {
            watch_root: watch_root.into(),
            library_root: library_root.into(),
        }
    }

    /// Resolve the destination for `source`.
    ///
    /// Returns `None` when the destination cannot be determined: the path
    /// has no name, lies outside the watch tree, or is a root-level file
    /// whose modification timestamp cannot be read (typically because it
    /// vanished between the notification and now). Callers skip such files;
    /// the reconciliation scanner will revisit them.
    #[must_use]
    pub fn resolve(&self, source: &Path) -> Option<PathBuf> {
        let file_name = source.file_name()?;

        if source.parent() == Some(self.watch_root.as_path()) {
            match source.metadata() {
                Ok(meta) if meta.is_file() => {
                    let modified = meta.modified().ok()?;
                    let bucket = DateTime::<Local>::from(modified).format("%Y-%m").to_string();
                    return Some(self.library_root.join(bucket).join(file_name));
                }
                // Root-level entries that vanished before the metadata read
                // are skipped; the scanner revisits anything that comes back.
                Err(_) => return None,
                Ok(_) => {}
            }
        }

        let relative = source.strip_prefix(&self.watch_root).ok()?;
        Some(self.library_root.join(relative))
    }
}
