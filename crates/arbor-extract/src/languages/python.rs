//! Python structural extractor

use arbor_core::{CodeNode, EdgeType, Lang, NodeType};
use tree_sitter::Node;

use super::{PendingRef, build_node};
use crate::registry::{node_text, start_line};

pub fn extract(
    root: Node<'_>,
    source: &str,
    file_path: &str,
) -> (Vec<CodeNode>, Vec<PendingRef>) {
    let mut nodes = Vec::new();
    let mut refs = Vec::new();
    walk(root, source, file_path, None, false, &mut nodes, &mut refs);
    collect_module_variables(root, source, file_path, &mut nodes);
    (nodes, refs)
}

/// Module-level `NAME = value` assignments become variable nodes. Only
/// direct children of the module count; function and class bodies are
/// scoped.
fn collect_module_variables(
    root: Node<'_>,
    source: &str,
    file_path: &str,
    nodes: &mut Vec<CodeNode>,
) {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() != "expression_statement" {
            continue;
        }
        let Some(assignment) = child.named_child(0) else {
            continue;
        };
        if assignment.kind() != "assignment" {
            continue;
        }
        let Some(left) = assignment.child_by_field_name("left") else {
            continue;
        };
        if left.kind() != "identifier" {
            continue;
        }
        let name = node_text(left, source);
        nodes.push(build_node(
            format!("{file_path}::{name}"),
            name,
            NodeType::Variable,
            Lang::Python,
            file_path,
            child,
            source,
        ));
    }
}

fn walk(
    node: Node<'_>,
    source: &str,
    file_path: &str,
    class_name: Option<&str>,
    in_function: bool,
    nodes: &mut Vec<CodeNode>,
    refs: &mut Vec<PendingRef>,
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "decorated_definition" => {
                if let Some(def) = child.child_by_field_name("definition") {
                    handle_definition(
                        def,
                        source,
                        file_path,
                        class_name,
                        in_function,
                        nodes,
                        refs,
                    );
                }
            }
            "function_definition" | "class_definition" => {
                handle_definition(
                    child,
                    source,
                    file_path,
                    class_name,
                    in_function,
                    nodes,
                    refs,
                );
            }
            "import_statement" => {
                let mut import_cursor = child.walk();
                for spec in child.named_children(&mut import_cursor) {
                    let module = match spec.kind() {
                        "dotted_name" => node_text(spec, source).to_string(),
                        "aliased_import" => spec
                            .child_by_field_name("name")
                            .map(|n| node_text(n, source).to_string())
                            .unwrap_or_default(),
                        _ => continue,
                    };
                    if !module.is_empty() {
                        push_import(child, &module, source, file_path, nodes, refs);
                    }
                }
            }
            "import_from_statement" => {
                if let Some(module) = child.child_by_field_name("module_name") {
                    let module = node_text(module, source).to_string();
                    push_import(child, &module, source, file_path, nodes, refs);
                }
            }
            _ => {
                walk(
                    child,
                    source,
                    file_path,
                    class_name,
                    in_function,
                    nodes,
                    refs,
                );
            }
        }
    }
}

fn handle_definition(
    def: Node<'_>,
    source: &str,
    file_path: &str,
    class_name: Option<&str>,
    in_function: bool,
    nodes: &mut Vec<CodeNode>,
    refs: &mut Vec<PendingRef>,
) {
    let Some(name_node) = def.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    match def.kind() {
        "class_definition" => {
            let id = format!("{file_path}::{name}");
            nodes.push(build_node(
                id.clone(),
                name,
                NodeType::Class,
                Lang::Python,
                file_path,
                def,
                source,
            ));
            if let Some(supers) = def.child_by_field_name("superclasses") {
                let mut cursor = supers.walk();
                for base in supers.named_children(&mut cursor) {
                    if matches!(base.kind(), "identifier" | "attribute") {
                        refs.push(PendingRef {
                            from_id: id.clone(),
                            target: node_text(base, source).to_string(),
                            edge_type: EdgeType::Extends,
                        });
                    }
                }
            }
            if let Some(body) = def.child_by_field_name("body") {
                walk(body, source, file_path, Some(name), false, nodes, refs);
            }
        }
        "function_definition" => {
            let (id, node_type) = if let Some(class) = class_name {
                (format!("{file_path}::{class}.{name}"), NodeType::Method)
            } else if in_function {
                let row = start_line(def);
                (
                    format!("{file_path}::method_{name}_{row}"),
                    NodeType::Function,
                )
            } else {
                (format!("{file_path}::{name}"), NodeType::Function)
            };
            nodes.push(build_node(
                id,
                name,
                node_type,
                Lang::Python,
                file_path,
                def,
                source,
            ));
            if let Some(body) = def.child_by_field_name("body") {
                walk(body, source, file_path, None, true, nodes, refs);
            }
        }
        _ => {}
    }
}

fn push_import(
    stmt: Node<'_>,
    module: &str,
    source: &str,
    file_path: &str,
    nodes: &mut Vec<CodeNode>,
    refs: &mut Vec<PendingRef>,
) {
    let row = start_line(stmt);
    let id = format!("{file_path}::import_{row}");
    nodes.push(build_node(
        id.clone(),
        module,
        NodeType::Import,
        Lang::Python,
        file_path,
        stmt,
        source,
    ));
    refs.push(PendingRef {
        from_id: id,
        target: module.to_string(),
        edge_type: EdgeType::Imports,
    });
}
