use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Keyed async mutex serialising read-modify-write of one title.
///
/// Keys follow `"<kind>-<canonical id>"` (`movie-603`, `series-1399`). One
/// lock covers a record and all of its seasons. Waiting is unbounded; a lock
/// is only ever held around a single record's read, recompute and write.
#[derive(Debug, Clone, Default)]
pub struct ContentLockMap {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ContentLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: impl Into<String>) -> ContentLock {
        let key = key.into();
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        trace!(key = %key, "content lock acquired");
        ContentLock {
            key,
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        }
    }

    /// Keys with a live entry (held or awaited).
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held lock for one key. Dropping it releases the key and discards the
/// map entry once nobody else holds or awaits it.
#[derive(Debug)]
pub struct ContentLock {
    key: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ContentLock {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for ContentLock {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters clone the Arc under the shard lock, so a count of one here
        // means the map holds the only reference.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
