//! Indexer configuration

use std::path::PathBuf;
use std::time::Duration;

/// Tunables for a full or incremental index run.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Root of the tree to index. Node IDs use paths relative to it.
    pub root: PathBuf,
    /// Exclusion glob patterns (matched per path component).
    pub exclude: Vec<String>,
    /// Embedding worker pool size.
    pub workers: usize,
    /// Texts per embedding batch.
    pub batch_size: usize,
    /// Embedding attempts before giving up.
    pub max_attempts: u32,
    /// First backoff delay; doubles per retry.
    pub retry_base_delay: Duration,
}

impl IndexerConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        IndexerConfig {
            root: root.into(),
            ..Default::default()
        }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        IndexerConfig {
            root: PathBuf::from("."),
            exclude: Vec::new(),
            workers: 4,
            batch_size: 100,
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}
