//! Per-language structural extraction
//!
//! Each language module walks the AST once and emits `CodeNode` records for
//! the entity kinds it recognizes, plus pending references (imports,
//! extends, implements) that are resolved against the symbol table after
//! the whole file has been seen.

pub mod cfamily;
pub mod go;
pub mod java;
pub mod jsfamily;
pub mod julia;
pub mod lisp;
pub mod python;
pub mod rust;

use arbor_core::{CodeNode, EdgeType, Lang, NodeType};
use tree_sitter::Node;

use crate::docs;
use crate::registry::{end_line, node_text, start_line};

/// A relationship noticed during structural extraction whose target is a
/// textual name, resolved to an ID once the file's symbol table exists.
#[derive(Debug, Clone)]
pub struct PendingRef {
    pub from_id: String,
    pub target: String,
    pub edge_type: EdgeType,
}

/// Dispatch to the language's extractor.
pub fn extract(
    lang: Lang,
    root: Node<'_>,
    source: &str,
    file_path: &str,
) -> (Vec<CodeNode>, Vec<PendingRef>) {
    match lang {
        Lang::C | Lang::Cpp => cfamily::extract(lang, root, source, file_path),
        Lang::Go => go::extract(root, source, file_path),
        Lang::Python => python::extract(root, source, file_path),
        Lang::JavaScript | Lang::TypeScript => jsfamily::extract(lang, root, source, file_path),
        Lang::Rust => rust::extract(root, source, file_path),
        Lang::Java => java::extract(root, source, file_path),
        Lang::Clojure | Lang::CommonLisp => lisp::extract(lang, root, source, file_path),
        Lang::Julia => julia::extract(root, source, file_path),
    }
}

/// Node kinds counted as decision points for the complexity estimate.
const DECISION_KINDS: &[&str] = &[
    "if_statement",
    "if_expression",
    "elif_clause",
    "conditional_expression",
    "ternary_expression",
    "for_statement",
    "for_expression",
    "for_in_statement",
    "while_statement",
    "while_expression",
    "loop_expression",
    "switch_statement",
    "switch_expression",
    "case_statement",
    "match_expression",
    "catch_clause",
    "except_clause",
    "guard_clause",
];

fn count_decisions(node: Node<'_>, acc: &mut u32) {
    if DECISION_KINDS.contains(&node.kind()) {
        *acc += 1;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        count_decisions(child, acc);
    }
}

/// Build a node record with ranges, content slice, docs and annotations.
/// Callable kinds also get a signature and a complexity estimate.
pub(crate) fn build_node(
    id: String,
    name: &str,
    node_type: NodeType,
    lang: Lang,
    file_path: &str,
    node: Node<'_>,
    source: &str,
) -> CodeNode {
    let mut out = CodeNode::new(id, name, node_type, lang.as_str(), file_path);
    out.start_line = start_line(node);
    out.end_line = end_line(node);
    out.start_col = node.start_position().column as u32;
    out.end_col = node.end_position().column as u32;
    out.content = node_text(node, source).to_string();
    let (doc, annotations) = docs::mine(node, source, lang);
    out.doc_comment = doc;
    out.annotations = annotations;
    if matches!(
        node_type,
        NodeType::Function | NodeType::Method | NodeType::Macro
    ) {
        out.signature = first_line_signature(&out.content);
        let mut decisions = 0u32;
        count_decisions(node, &mut decisions);
        out.complexity = Some(1.0 + decisions as f32);
    }
    out
}

fn first_line_signature(content: &str) -> Option<String> {
    let line = content.lines().next()?.trim().trim_end_matches('{').trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

/// Depth-first search for the first identifier-like descendant.
pub(crate) fn first_identifier<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    if kinds.contains(&node.kind()) {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(found) = first_identifier(child, kinds) {
            return Some(found);
        }
    }
    None
}
