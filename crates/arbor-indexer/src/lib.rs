//! Arbor Indexer — incremental indexing pipeline
//!
//! Change detection by content hash, parallel parsing, embedding with
//! bounded retry and a fixed worker pool, and atomic per-file commits.

pub mod config;
pub mod embed;
pub mod hash;
pub mod pipeline;
pub mod status;

#[cfg(test)]
mod tests;

pub use config::IndexerConfig;
pub use embed::EmbedMetrics;
pub use hash::{compute_file_hash, hash_bytes};
pub use pipeline::{IndexSummary, Indexer};
pub use status::{ProgressCallback, StatusHandle};
