//! Time-windowed memo that suppresses duplicate work.
//!
//! # Design
//! - One cache serves two key shapes: second-bucketed event keys (debounce)
//!   and `(source, destination)` operation keys (double-enqueue guard).
//! - Expiry is advisory. An entry that lapses early causes at most a
//!   duplicate no-op because the underlying file operations are idempotent.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Key identifying a logical operation within the dedup window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    /// Event-level debounce key: notification time truncated to whole
    /// seconds, plus the notified path.
    Event {
        /// Unix timestamp floored to 1-second resolution.
        bucket: i64,
        /// Path carried by the notification.
        path: PathBuf,
    },
    /// Operation-level key preventing two enqueues of the same transform
    /// from both executing.
    Operation {
        /// Source path of the transform.
        source: PathBuf,
        /// Destination path of the transform.
        destination: PathBuf,
    },
}

/// Expiring concurrent map of recently seen [`DedupKey`]s.
pub struct DedupCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<DedupKey, Instant>>,
}

impl DedupCache {
    /// Construct a cache bounded to `capacity` live entries with the given
    /// per-entry lifetime.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            ttl,
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Record a sighting of `key`.
    ///
    /// Returns `true` when the key was not already live, in which case it is
    /// now marked for the TTL window. Returns `false` for a duplicate.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex has been poisoned.
    pub fn observe(&self, key: DedupKey) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("dedup cache mutex poisoned");

        entries.retain(|_, expiry| *expiry > now);

        if entries.contains_key(&key) {
            return false;
        }

        // At capacity the soonest-to-expire entry gives way; dropping the
        // oldest sighting only risks one extra idempotent pass.
        if entries.len() >= self.capacity
            && let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, expiry)| **expiry)
                .map(|(key, _)| key.clone())
        {
            entries.remove(&oldest);
        }

        entries.insert(key, now + self.ttl);
        true
    }

    /// Number of live entries. Expired entries may still be counted until
    /// the next [`DedupCache::observe`] call purges them.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex has been poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("dedup cache mutex poisoned").len()
    }

    /// Whether the cache currently holds no entries.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex has been poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn event_key(bucket: i64, path: &str) -> DedupKey {
        DedupKey::Event {
            bucket,
            path: Path::new(path).to_path_buf(),
        }
    }

    #[test]
    fn duplicate_within_window_is_suppressed() {
        let cache = DedupCache::new(16, Duration::from_secs(60));
        assert!(cache.observe(event_key(1, "/drop/a.jpg")));
        assert!(!cache.observe(event_key(1, "/drop/a.jpg")));
        // A new bucket is a new sighting.
        assert!(cache.observe(event_key(2, "/drop/a.jpg")));
    }

    #[test]
    fn entries_lapse_after_ttl() {
        let cache = DedupCache::new(16, Duration::from_millis(20));
        assert!(cache.observe(event_key(1, "/drop/a.jpg")));
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.observe(event_key(1, "/drop/a.jpg")));
    }

    #[test]
    fn capacity_evicts_soonest_to_expire() {
        let cache = DedupCache::new(2, Duration::from_secs(60));
        assert!(cache.observe(event_key(1, "/drop/a.jpg")));
        assert!(cache.observe(event_key(1, "/drop/b.jpg")));
        assert!(cache.observe(event_key(1, "/drop/c.jpg")));
        assert_eq!(cache.len(), 2);
        // The first sighting was evicted, so it registers as fresh again.
        assert!(cache.observe(event_key(1, "/drop/a.jpg")));
    }

    #[test]
    fn operation_keys_are_independent_of_event_keys() {
        let cache = DedupCache::new(16, Duration::from_secs(60));
        let operation = DedupKey::Operation {
            source: Path::new("/drop/a.jpg").to_path_buf(),
            destination: Path::new("/library/a.webp").to_path_buf(),
        };
        assert!(cache.observe(event_key(1, "/drop/a.jpg")));
        assert!(cache.observe(operation.clone()));
        assert!(!cache.observe(operation));
    }
}
