//! Arbor Extract — multi-language structural extraction
//!
//! Turns source bytes into `CodeNode`s and `CodeEdge`s: grammar registry,
//! doc/annotation mining, per-language symbol tables, structural extraction
//! and call-edge attribution.

pub mod docs;
pub mod edges;
pub mod languages;
pub mod registry;
pub mod symbols;


use std::collections::HashSet;
use std::path::Path;

use arbor_core::{CodeEdge, CodeNode, EdgeType, Lang};
use thiserror::Error;

use edges::EdgeExtractor;
use languages::PendingRef;
use symbols::ResolveContext;

/// Everything extracted from one file.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub nodes: Vec<CodeNode>,
    pub edges: Vec<CodeEdge>,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    #[error("parse failed for {0}")]
    Parse(String),
}

/// Parse one file into nodes and edges. The file path becomes the ID prefix
/// for every node, so the same relative path must be used on re-index.
pub fn parse_source(file_path: &str, source: &str) -> Result<ParseResult, ExtractError> {
    let lang = Lang::from_path(Path::new(file_path))
        .ok_or_else(|| ExtractError::Unsupported(file_path.to_string()))?;
    parse_source_as(lang, file_path, source)
}

/// Parse with an explicit language, bypassing extension detection.
pub fn parse_source_as(
    lang: Lang,
    file_path: &str,
    source: &str,
) -> Result<ParseResult, ExtractError> {
    let tree = registry::parse(lang, source.as_bytes())
        .ok_or_else(|| ExtractError::Parse(file_path.to_string()))?;
    let root = tree.root_node();
    // Error recovery yields a well-kinded root with error nodes nested
    // inside it; either way the file is skipped, not half-extracted.
    if root.has_error() {
        return Err(ExtractError::Parse(file_path.to_string()));
    }

    let (nodes, pending) = languages::extract(lang, root, source, file_path);
    let table = symbols::build_table(lang, root, source, file_path, &nodes);

    let mut edges = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for PendingRef {
        from_id,
        target,
        edge_type,
    } in pending
    {
        let to_id = if edge_type == EdgeType::Imports {
            // Imports point outside the file by construction.
            format!("external::{target}")
        } else {
            let ctx = ResolveContext {
                file_path,
                current_function: None,
                namespace: None,
            };
            table.resolve(&target, &ctx).0
        };
        let edge = CodeEdge::new(from_id, to_id, edge_type);
        if seen.insert(edge.id.clone()) {
            edges.push(edge);
        }
    }

    let call_edges = EdgeExtractor::new(lang, source, file_path, &nodes, table.as_ref()).run(root);
    for edge in call_edges {
        if seen.insert(edge.id.clone()) {
            edges.push(edge);
        }
    }

    tracing::debug!(
        "parsed {}: {} nodes, {} edges",
        file_path,
        nodes.len(),
        edges.len()
    );
    Ok(ParseResult { nodes, edges })
}
