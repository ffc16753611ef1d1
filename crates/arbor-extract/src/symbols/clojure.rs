//! Clojure (and Common Lisp) symbol table: namespaces, aliases, refers

use std::collections::HashMap;

use arbor_core::NodeType;
use tree_sitter::Node;

use super::{ResolveContext, SymbolTable, synthetic_id};
use crate::registry::node_text;

pub struct ClojureSymbols {
    current_ns: String,
    /// Namespace -> symbol -> node ID.
    ns_defs: HashMap<String, HashMap<String, String>>,
    /// `:as` aliases: alias -> namespace.
    aliases: HashMap<String, String>,
    /// `:refer` symbols: symbol -> source namespace.
    referred: HashMap<String, String>,
}

impl ClojureSymbols {
    pub fn new() -> Self {
        ClojureSymbols {
            current_ns: "user".to_string(),
            ns_defs: HashMap::new(),
            aliases: HashMap::new(),
            referred: HashMap::new(),
        }
    }

    pub fn set_namespace(&mut self, ns: &str) {
        self.current_ns = ns.to_string();
    }

    pub fn refer(&mut self, symbol: &str, ns: &str) {
        self.referred.insert(symbol.to_string(), ns.to_string());
    }
}

impl Default for ClojureSymbols {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable for ClojureSymbols {
    fn register(&mut self, name: &str, id: &str, _kind: NodeType) {
        self.ns_defs
            .entry(self.current_ns.clone())
            .or_default()
            .insert(name.to_string(), id.to_string());
    }

    fn register_import(&mut self, alias: &str, target: &str) {
        self.aliases.insert(alias.to_string(), target.to_string());
    }

    fn resolve(&self, name: &str, ctx: &ResolveContext<'_>) -> (String, bool) {
        if let Some((prefix, symbol)) = name.split_once('/') {
            let ns = self
                .aliases
                .get(prefix)
                .map(String::as_str)
                .unwrap_or(prefix);
            if let Some(id) = self.ns_defs.get(ns).and_then(|d| d.get(symbol)) {
                return (id.clone(), true);
            }
            return (format!("external::{ns}/{symbol}"), false);
        }
        if let Some(ns) = self.referred.get(name) {
            if let Some(id) = self.ns_defs.get(ns).and_then(|d| d.get(name)) {
                return (id.clone(), true);
            }
            return (format!("external::{ns}/{name}"), false);
        }
        let ns = ctx.namespace.unwrap_or(&self.current_ns);
        if let Some(id) = self.ns_defs.get(ns).and_then(|d| d.get(name)) {
            return (id.clone(), true);
        }
        if let Some(id) = self
            .ns_defs
            .get(&self.current_ns)
            .and_then(|d| d.get(name))
        {
            return (id.clone(), true);
        }
        (synthetic_id(name, ctx.file_path), false)
    }
}

/// Process `(ns ...)` / `(in-package ...)` declarations eagerly, including
/// `:require [ns :as alias :refer [x y]]` clauses in both bare and vector
/// forms.
pub fn scan_namespaces(table: &mut ClojureSymbols, root: Node<'_>, source: &str) {
    let mut cursor = root.walk();
    for form in root.named_children(&mut cursor) {
        if form.kind() != "list_lit" {
            continue;
        }
        let mut children: Vec<Node<'_>> = Vec::new();
        let mut form_cursor = form.walk();
        for child in form.named_children(&mut form_cursor) {
            children.push(child);
        }
        let Some(head) = children.first() else {
            continue;
        };
        if head.kind() != "sym_lit" {
            continue;
        }
        match node_text(*head, source) {
            "ns" | "defpackage" | "in-package" | "in-ns" => {
                if let Some(name) = children.get(1) {
                    let ns = node_text(*name, source)
                        .trim_start_matches([':', '\'', '#'])
                        .to_string();
                    table.set_namespace(&ns);
                }
                for clause in children.iter().skip(2) {
                    if clause.kind() == "list_lit" {
                        scan_require_clause(table, *clause, source);
                    }
                }
            }
            "require" => {
                for spec in children.iter().skip(1) {
                    scan_require_spec(table, *spec, source);
                }
            }
            _ => {}
        }
    }
}

/// `(:require [a.b :as ab] c.d)` inside an `ns` form.
fn scan_require_clause(table: &mut ClojureSymbols, clause: Node<'_>, source: &str) {
    let mut cursor = clause.walk();
    let mut children: Vec<Node<'_>> = Vec::new();
    for child in clause.named_children(&mut cursor) {
        children.push(child);
    }
    let Some(head) = children.first() else {
        return;
    };
    if head.kind() != "kwd_lit" || node_text(*head, source) != ":require" {
        return;
    }
    for spec in children.iter().skip(1) {
        scan_require_spec(table, *spec, source);
    }
}

/// A single require spec: bare `ns.name`, quoted, or `[ns :as a :refer [..]]`.
fn scan_require_spec(table: &mut ClojureSymbols, spec: Node<'_>, source: &str) {
    match spec.kind() {
        "sym_lit" => {
            let ns = node_text(spec, source);
            table.register_import(ns, ns);
        }
        "quoting_lit" => {
            if let Some(inner) = spec.named_child(0) {
                scan_require_spec(table, inner, source);
            }
        }
        "vec_lit" | "list_lit" => {
            let mut cursor = spec.walk();
            let mut children: Vec<Node<'_>> = Vec::new();
            for child in spec.named_children(&mut cursor) {
                children.push(child);
            }
            let Some(ns_node) = children.first() else {
                return;
            };
            let ns = node_text(*ns_node, source).to_string();
            table.register_import(&ns, &ns);
            let mut i = 1;
            while i < children.len() {
                let child = children[i];
                if child.kind() == "kwd_lit" {
                    match node_text(child, source) {
                        ":as" => {
                            if let Some(alias) = children.get(i + 1) {
                                table.register_import(node_text(*alias, source), &ns);
                                i += 1;
                            }
                        }
                        ":refer" => {
                            if let Some(refs) = children.get(i + 1) {
                                let mut refs_cursor = refs.walk();
                                for sym in refs.named_children(&mut refs_cursor) {
                                    if sym.kind() == "sym_lit" {
                                        table.refer(node_text(sym, source), &ns);
                                    }
                                }
                                i += 1;
                            }
                        }
                        _ => {}
                    }
                }
                i += 1;
            }
        }
        _ => {}
    }
}
