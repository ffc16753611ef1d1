//! Shared indexer status

use std::sync::Arc;

use arbor_core::IndexStatus;
use tokio::sync::RwLock;

/// Progress observers receive value snapshots, never the live record.
pub type ProgressCallback = Arc<dyn Fn(IndexStatus) + Send + Sync>;

#[derive(Clone, Default)]
pub struct StatusHandle {
    inner: Arc<RwLock<IndexStatus>>,
    callback: Option<ProgressCallback>,
}

impl StatusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub async fn snapshot(&self) -> IndexStatus {
        self.inner.read().await.clone()
    }

    /// Mutate the status under the write lock, then notify the observer
    /// with a deep copy so later mutation cannot race it.
    pub async fn update(&self, mutate: impl FnOnce(&mut IndexStatus)) {
        let snapshot = {
            let mut status = self.inner.write().await;
            mutate(&mut status);
            status.clone()
        };
        if let Some(callback) = &self.callback {
            callback(snapshot);
        }
    }
}
