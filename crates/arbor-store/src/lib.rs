//! Arbor Store — typed property-graph persistence on SQLite
//!
//! Tables `nodes`, `edges` and `file_metadata`, per-file mutual exclusion,
//! atomic replace-file transactions and the graph query primitives.

pub mod locks;
pub mod query;
pub mod schema;
pub mod store;

#[cfg(test)]
mod tests;

use thiserror::Error;

pub use locks::{FileLockGuard, FileLockMap};
pub use query::ScoredNode;
pub use store::GraphStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("encoding error: {0}")]
    Encode(String),
    #[error("operation cancelled")]
    Cancelled,
}
