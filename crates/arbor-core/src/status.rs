//! Indexer status read model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the indexer is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    Idle,
    Indexing,
    Watching,
    Error,
}

impl Default for IndexState {
    fn default() -> Self {
        IndexState::Idle
    }
}

/// Mutable status record exposed by the indexer.
///
/// Callers receive value snapshots; the errors vector is cloned with the
/// rest of the record so later mutation cannot race a callback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStatus {
    pub state: IndexState,
    pub files_scanned: u64,
    pub files_indexed: u64,
    pub files_skipped: u64,
    pub files_deleted: u64,
    pub node_count: u64,
    pub edge_count: u64,
    pub embedding_success_count: u64,
    pub embedding_retry_count: u64,
    pub embedding_failure_count: u64,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl IndexStatus {
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}
