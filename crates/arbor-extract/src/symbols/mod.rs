//! Per-language symbol tables for callee resolution
//!
//! Each table supports three operations: register a definition, register an
//! import alias, and resolve a textual name to a node ID. Resolution is
//! best-effort; unresolved names synthesize stable external IDs so that a
//! later index of the target file heals the reference.

pub mod cfamily;
pub mod clojure;
pub mod generic;
pub mod go;

use arbor_core::{CodeNode, Lang, NodeType};
use tree_sitter::Node;

pub use cfamily::CFamilySymbols;
pub use clojure::ClojureSymbols;
pub use generic::GenericSymbols;
pub use go::GoSymbols;

/// Where a reference occurs, for scope-sensitive resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveContext<'a> {
    pub file_path: &'a str,
    pub current_function: Option<&'a str>,
    pub namespace: Option<&'a str>,
}

/// Shared capability set over the four table variants.
pub trait SymbolTable: Send {
    fn register(&mut self, name: &str, id: &str, kind: NodeType);
    fn register_import(&mut self, alias: &str, target: &str);
    /// Resolve `name` to `(id, found)`. When `found` is false the ID is a
    /// synthetic `external::<name>` / `<file>::<name>` identifier.
    fn resolve(&self, name: &str, ctx: &ResolveContext<'_>) -> (String, bool);
}

/// Fallback identity for names no table could resolve: dotted or scoped
/// names are treated as external, bare names as file-local.
pub fn synthetic_id(name: &str, file_path: &str) -> String {
    if name.contains('.') || name.contains("::") || name.contains('/') {
        format!("external::{name}")
    } else {
        format!("{file_path}::{name}")
    }
}

/// The registration key for a node: methods and namespaced definitions are
/// keyed by their qualified local name (`recv.name`, `ns/name`), everything
/// else by its plain name.
fn local_name(node: &CodeNode) -> &str {
    node.id.rsplit("::").next().unwrap_or(&node.name)
}

/// Build the table variant for a language: run the language-specific
/// import/namespace pass first, then seed the file's extracted nodes.
pub fn build_table(
    lang: Lang,
    root: Node<'_>,
    source: &str,
    file_path: &str,
    nodes: &[CodeNode],
) -> Box<dyn SymbolTable> {
    match lang {
        Lang::Go => {
            let mut table = GoSymbols::new();
            go::scan_imports(&mut table, root, source);
            seed(&mut table, nodes);
            Box::new(table)
        }
        Lang::C | Lang::Cpp => {
            let mut table = CFamilySymbols::new(file_path);
            cfamily::scan_includes(&mut table, root, source);
            seed(&mut table, nodes);
            Box::new(table)
        }
        Lang::Clojure | Lang::CommonLisp => {
            let mut table = ClojureSymbols::new();
            clojure::scan_namespaces(&mut table, root, source);
            seed(&mut table, nodes);
            Box::new(table)
        }
        _ => {
            let mut table = GenericSymbols::new();
            seed(&mut table, nodes);
            Box::new(table)
        }
    }
}

fn seed<T: SymbolTable>(table: &mut T, nodes: &[CodeNode]) {
    for node in nodes {
        table.register(&node.name, &node.id, node.node_type);
        let local = local_name(node);
        if local != node.name {
            table.register(local, &node.id, node.node_type);
        }
    }
}
