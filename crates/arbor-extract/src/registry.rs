//! Grammar registry: per-language tree-sitter parser construction
//!
//! The rest of the crate consumes the generic `tree_sitter::Node` interface
//! (child count, child-at-index, child-by-field-name, kind, byte and point
//! ranges, previous sibling, error flags), so this is the only module that
//! knows which grammar backs which language.

use arbor_core::Lang;
use tree_sitter::{Language, Node, Parser, Tree};

/// The tree-sitter grammar for a language.
pub fn grammar(lang: Lang) -> Language {
    match lang {
        Lang::C => tree_sitter_c::LANGUAGE.into(),
        Lang::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        Lang::Go => tree_sitter_go::LANGUAGE.into(),
        Lang::Python => tree_sitter_python::LANGUAGE.into(),
        Lang::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        Lang::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Lang::Rust => tree_sitter_rust::LANGUAGE.into(),
        Lang::Java => tree_sitter_java::LANGUAGE.into(),
        Lang::Clojure => tree_sitter_clojure::LANGUAGE.into(),
        Lang::Julia => tree_sitter_julia::LANGUAGE.into(),
        Lang::CommonLisp => tree_sitter_commonlisp::LANGUAGE_COMMONLISP.into(),
    }
}

/// Parse a byte buffer into a syntax tree. Returns `None` when the parser
/// cannot be configured or gives up entirely; partial error subtrees still
/// yield a tree.
pub fn parse(lang: Lang, source: &[u8]) -> Option<Tree> {
    let mut parser = Parser::new();
    parser.set_language(&grammar(lang)).ok()?;
    parser.parse(source, None)
}

/// Source text covered by a node, or "" when the range is not valid UTF-8.
pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// 1-based start line.
pub fn start_line(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based end line.
pub fn end_line(node: Node<'_>) -> u32 {
    node.end_position().row as u32 + 1
}
