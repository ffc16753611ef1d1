//! Reference-counted per-file locks
//!
//! Serializes "replace file" operations per path across the whole process.
//! Entries are removed at refcount zero so the table does not grow without
//! bound across large repositories. tokio's Mutex wakes waiters in FIFO
//! order, which keeps per-file updates fair.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

struct LockEntry {
    mutex: Arc<Mutex<()>>,
    refcount: usize,
}

#[derive(Clone, Default)]
pub struct FileLockMap {
    entries: Arc<DashMap<String, LockEntry>>,
}

impl FileLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `path`, waiting behind earlier holders.
    pub async fn lock(&self, path: &str) -> FileLockGuard {
        let mutex = {
            let mut entry = self
                .entries
                .entry(path.to_string())
                .or_insert_with(|| LockEntry {
                    mutex: Arc::new(Mutex::new(())),
                    refcount: 0,
                });
            entry.refcount += 1;
            Arc::clone(&entry.mutex)
        };
        let guard = mutex.lock_owned().await;
        FileLockGuard {
            entries: Arc::clone(&self.entries),
            path: path.to_string(),
            _guard: guard,
        }
    }

    #[cfg(test)]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

pub struct FileLockGuard {
    entries: Arc<DashMap<String, LockEntry>>,
    path: String,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        let remove = {
            match self.entries.get_mut(&self.path) {
                Some(mut entry) => {
                    entry.refcount -= 1;
                    entry.refcount == 0
                }
                None => false,
            }
        };
        if remove {
            // Re-check under the shard lock; another caller may have
            // re-acquired between the decrement and here.
            self.entries.remove_if(&self.path, |_, e| e.refcount == 0);
        }
    }
}
