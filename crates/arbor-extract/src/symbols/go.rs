//! Go symbol table: package clauses, import aliases, per-package definitions

use std::collections::HashMap;

use arbor_core::NodeType;
use tree_sitter::Node;

use super::{ResolveContext, SymbolTable, synthetic_id};
use crate::registry::node_text;

pub struct GoSymbols {
    /// Package declared by this file's `package` clause.
    package: Option<String>,
    /// Import alias -> package path. Default alias is the last path
    /// segment; `.` imports are stored under their own path.
    imports: HashMap<String, String>,
    /// Direct definitions: name (or `recv.name` for methods) -> node ID.
    defs: HashMap<String, String>,
    /// Per-package symbol maps for functions, methods and types.
    package_defs: HashMap<String, HashMap<String, String>>,
}

impl GoSymbols {
    pub fn new() -> Self {
        GoSymbols {
            package: None,
            imports: HashMap::new(),
            defs: HashMap::new(),
            package_defs: HashMap::new(),
        }
    }

    fn set_package(&mut self, name: &str) {
        self.package = Some(name.to_string());
    }
}

impl Default for GoSymbols {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable for GoSymbols {
    fn register(&mut self, name: &str, id: &str, _kind: NodeType) {
        self.defs.insert(name.to_string(), id.to_string());
        if let Some(pkg) = self.package.clone() {
            self.package_defs
                .entry(pkg)
                .or_default()
                .insert(name.to_string(), id.to_string());
        }
    }

    fn register_import(&mut self, alias: &str, target: &str) {
        let alias = if alias == "." { target } else { alias };
        self.imports.insert(alias.to_string(), target.to_string());
    }

    fn resolve(&self, name: &str, ctx: &ResolveContext<'_>) -> (String, bool) {
        if let Some((alias, symbol)) = name.split_once('.') {
            if let Some(pkg_path) = self.imports.get(alias) {
                if let Some(defs) = self.package_defs.get(pkg_path) {
                    if let Some(id) = defs.get(symbol) {
                        return (id.clone(), true);
                    }
                }
                let last = pkg_path.rsplit('/').next().unwrap_or(pkg_path);
                if let Some(defs) = self.package_defs.get(last) {
                    if let Some(id) = defs.get(symbol) {
                        return (id.clone(), true);
                    }
                }
                return (format!("{pkg_path}::{symbol}"), false);
            }
            return (synthetic_id(name, ctx.file_path), false);
        }
        if let Some(id) = self.defs.get(name) {
            return (id.clone(), true);
        }
        if let Some(pkg) = ctx.namespace.or(self.package.as_deref()) {
            if let Some(id) = self.package_defs.get(pkg).and_then(|d| d.get(name)) {
                return (id.clone(), true);
            }
        }
        if let Some(pkg) = self.package.as_deref() {
            if let Some(id) = self.package_defs.get(pkg).and_then(|d| d.get(name)) {
                return (id.clone(), true);
            }
        }
        (synthetic_id(name, ctx.file_path), false)
    }
}

/// Populate package and import state from the AST.
pub fn scan_imports(table: &mut GoSymbols, root: Node<'_>, source: &str) {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "package_clause" => {
                if let Some(name) = child.named_child(0) {
                    table.set_package(node_text(name, source));
                }
            }
            "import_declaration" => {
                let mut spec_cursor = child.walk();
                for spec in child.named_children(&mut spec_cursor) {
                    match spec.kind() {
                        "import_spec" => register_spec(table, spec, source),
                        "import_spec_list" => {
                            let mut list_cursor = spec.walk();
                            for inner in spec.named_children(&mut list_cursor) {
                                if inner.kind() == "import_spec" {
                                    register_spec(table, inner, source);
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
}

fn register_spec(table: &mut GoSymbols, spec: Node<'_>, source: &str) {
    let path_node = match spec.child_by_field_name("path") {
        Some(n) => n,
        None => return,
    };
    let path = node_text(path_node, source).trim_matches('"').to_string();
    let alias = spec
        .child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_else(|| path.rsplit('/').next().unwrap_or(&path).to_string());
    table.register_import(&alias, &path);
}
