//! Julia structural extractor

use arbor_core::{CodeNode, EdgeType, Lang, NodeType};
use tree_sitter::Node;

use super::{PendingRef, build_node, first_identifier};
use crate::registry::{node_text, start_line};

pub fn extract(
    root: Node<'_>,
    source: &str,
    file_path: &str,
) -> (Vec<CodeNode>, Vec<PendingRef>) {
    let mut nodes = Vec::new();
    let mut refs = Vec::new();
    walk(root, source, file_path, &mut nodes, &mut refs);
    (nodes, refs)
}

fn walk(
    node: Node<'_>,
    source: &str,
    file_path: &str,
    nodes: &mut Vec<CodeNode>,
    refs: &mut Vec<PendingRef>,
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "function_definition" | "short_function_definition" => {
                if let Some(name) = callable_name(child, source) {
                    nodes.push(build_node(
                        format!("{file_path}::{name}"),
                        &name,
                        NodeType::Function,
                        Lang::Julia,
                        file_path,
                        child,
                        source,
                    ));
                }
            }
            "macro_definition" => {
                if let Some(name) = callable_name(child, source) {
                    nodes.push(build_node(
                        format!("{file_path}::macro_{name}"),
                        &name,
                        NodeType::Macro,
                        Lang::Julia,
                        file_path,
                        child,
                        source,
                    ));
                }
            }
            "module_definition" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = node_text(name_node, source);
                    nodes.push(build_node(
                        format!("{file_path}::ns_{name}"),
                        name,
                        NodeType::Module,
                        Lang::Julia,
                        file_path,
                        child,
                        source,
                    ));
                }
                walk(child, source, file_path, nodes, refs);
            }
            "struct_definition" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = node_text(name_node, source);
                    nodes.push(build_node(
                        format!("{file_path}::{name}"),
                        name,
                        NodeType::Struct,
                        Lang::Julia,
                        file_path,
                        child,
                        source,
                    ));
                }
            }
            "abstract_definition" | "primitive_definition" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = node_text(name_node, source);
                    nodes.push(build_node(
                        format!("{file_path}::{name}"),
                        name,
                        NodeType::Type,
                        Lang::Julia,
                        file_path,
                        child,
                        source,
                    ));
                }
            }
            "const_statement" => {
                if let Some(ident) = first_identifier(child, &["identifier"]) {
                    let name = node_text(ident, source);
                    nodes.push(build_node(
                        format!("{file_path}::{name}"),
                        name,
                        NodeType::Variable,
                        Lang::Julia,
                        file_path,
                        child,
                        source,
                    ));
                }
            }
            "using_statement" | "import_statement" => {
                let target = node_text(child, source)
                    .trim_start_matches("using")
                    .trim_start_matches("import")
                    .trim()
                    .to_string();
                if !target.is_empty() {
                    let row = start_line(child);
                    let id = format!("{file_path}::import_{row}");
                    nodes.push(build_node(
                        id.clone(),
                        &target,
                        NodeType::Import,
                        Lang::Julia,
                        file_path,
                        child,
                        source,
                    ));
                    refs.push(PendingRef {
                        from_id: id,
                        target,
                        edge_type: EdgeType::Imports,
                    });
                }
            }
            _ => {}
        }
    }
}

/// Function and macro names may sit directly in a `name` field or inside a
/// `signature`/`call_expression` header.
fn callable_name(def: Node<'_>, source: &str) -> Option<String> {
    if let Some(name_node) = def.child_by_field_name("name") {
        return Some(node_text(name_node, source).to_string());
    }
    let mut cursor = def.walk();
    for child in def.named_children(&mut cursor) {
        if matches!(child.kind(), "signature" | "call_expression") {
            let target = if child.kind() == "signature" {
                child.named_child(0)?
            } else {
                child
            };
            if target.kind() == "call_expression" {
                let head = target.named_child(0)?;
                if matches!(head.kind(), "identifier" | "field_expression" | "operator") {
                    return Some(node_text(head, source).to_string());
                }
            }
            if let Some(ident) = first_identifier(target, &["identifier", "operator"]) {
                return Some(node_text(ident, source).to_string());
            }
        }
        if child.kind() == "identifier" {
            return Some(node_text(child, source).to_string());
        }
    }
    None
}
