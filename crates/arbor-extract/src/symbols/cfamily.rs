//! C/C++ symbol table: per-file maps plus an include list

use std::collections::HashMap;

use arbor_core::NodeType;
use tree_sitter::Node;

use super::{ResolveContext, SymbolTable, synthetic_id};
use crate::registry::node_text;

pub struct CFamilySymbols {
    file_path: String,
    /// Merged table across everything registered.
    merged: HashMap<String, String>,
    /// Per-file symbol maps; header symbols land under their own path.
    per_file: HashMap<String, HashMap<String, String>>,
    /// Paths named by `#include` directives, in order of appearance.
    includes: Vec<String>,
}

impl CFamilySymbols {
    pub fn new(file_path: &str) -> Self {
        CFamilySymbols {
            file_path: file_path.to_string(),
            merged: HashMap::new(),
            per_file: HashMap::new(),
            includes: Vec::new(),
        }
    }
}

impl SymbolTable for CFamilySymbols {
    fn register(&mut self, name: &str, id: &str, _kind: NodeType) {
        self.merged.insert(name.to_string(), id.to_string());
        self.per_file
            .entry(self.file_path.clone())
            .or_default()
            .insert(name.to_string(), id.to_string());
    }

    fn register_import(&mut self, _alias: &str, target: &str) {
        self.includes.push(target.to_string());
    }

    fn resolve(&self, name: &str, ctx: &ResolveContext<'_>) -> (String, bool) {
        if name.contains("::") {
            if let Some(id) = self.merged.get(name) {
                return (id.clone(), true);
            }
            return (format!("external::{name}"), false);
        }
        // Member access cannot be resolved without type information.
        if name.contains('.') || name.contains("->") {
            return (format!("external::{name}"), false);
        }
        if let Some(id) = self.merged.get(name) {
            return (id.clone(), true);
        }
        if let Some(id) = self.per_file.get(ctx.file_path).and_then(|m| m.get(name)) {
            return (id.clone(), true);
        }
        for include in &self.includes {
            if let Some(id) = self.per_file.get(include).and_then(|m| m.get(name)) {
                return (id.clone(), true);
            }
        }
        (synthetic_id(name, ctx.file_path), false)
    }
}

/// Record the file's `#include` directives.
pub fn scan_includes(table: &mut CFamilySymbols, root: Node<'_>, source: &str) {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() == "preproc_include" {
            if let Some(path) = child.child_by_field_name("path") {
                let target = node_text(path, source)
                    .trim_matches(['"', '<', '>'])
                    .to_string();
                table.register_import(&target, &target);
            }
        }
    }
}
