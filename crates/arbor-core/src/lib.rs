//! Arbor Core — graph data model, language registry, and exclusion matching

pub mod exclude;
pub mod language;
pub mod model;
pub mod status;

#[cfg(test)]
mod tests;

pub use exclude::ExcludeMatcher;
pub use language::Lang;
pub use model::{CodeEdge, CodeNode, EdgeType, FileMetadata, NodeType, edge_id};
pub use status::{IndexState, IndexStatus};
