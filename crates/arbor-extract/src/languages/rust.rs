//! Rust structural extractor

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
            "function_item" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = node_text(name_node, source);
                    nodes.push(build_node(
                        format!("{file_path}::{name}"),
                        name,
                        NodeType::Function,
                        Lang::Rust,
                        file_path,
                        child,
                        source,
                    ));
                }
            }
            "struct_item" | "union_item" => {
                push_named(child, NodeType::Struct, source, file_path, nodes);
            }
            "enum_item" => {
                push_named(child, NodeType::Enum, source, file_path, nodes);
            }
            "trait_item" => {
                push_named(child, NodeType::Interface, source, file_path, nodes);
            }
            "type_item" => {
                push_named(child, NodeType::Type, source, file_path, nodes);
            }
            "static_item" | "const_item" => {
                push_named(child, NodeType::Variable, source, file_path, nodes);
            }
            "macro_definition" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = node_text(name_node, source);
                    nodes.push(build_node(
                        format!("{file_path}::macro_{name}"),
                        name,
                        NodeType::Macro,
                        Lang::Rust,
                        file_path,
                        child,
                        source,
                    ));
                }
            }
            "mod_item" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = node_text(name_node, source);
                    nodes.push(build_node(
                        format!("{file_path}::ns_{name}"),
                        name,
                        NodeType::Module,
                        Lang::Rust,
                        file_path,
                        child,
                        source,
                    ));
                }
                if let Some(body) = child.child_by_field_name("body") {
                    walk(body, source, file_path, nodes, refs);
                }
            }
            "use_declaration" => {
                if let Some(arg) = child.child_by_field_name("argument") {
                    let target = node_text(arg, source).to_string();
                    let row = start_line(child);
                    let id = format!("{file_path}::import_{row}");
                    nodes.push(build_node(
                        id.clone(),
                        &target,
                        NodeType::Import,
                        Lang::Rust,
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
            "impl_item" => {
                handle_impl(child, source, file_path, nodes, refs);
            }
            _ => {}
        }
    }
}

fn push_named(
    node: Node<'_>,
    node_type: NodeType,
    source: &str,
    file_path: &str,
    nodes: &mut Vec<CodeNode>,
) {
    if let Some(name_node) = node.child_by_field_name("name") {
        let name = node_text(name_node, source);
        nodes.push(build_node(
            format!("{file_path}::{name}"),
            name,
            node_type,
            Lang::Rust,
            file_path,
            node,
            source,
        ));
    }
}

fn handle_impl(
    impl_item: Node<'_>,
    source: &str,
    file_path: &str,
    nodes: &mut Vec<CodeNode>,
    refs: &mut Vec<PendingRef>,
) {
    let receiver = impl_item
        .child_by_field_name("type")
        .map(|t| base_type_name(t, source))
        .unwrap_or_default();
    if let Some(trait_node) = impl_item.child_by_field_name("trait") {
        if !receiver.is_empty() {
            refs.push(PendingRef {
                from_id: format!("{file_path}::{receiver}"),
                target: node_text(trait_node, source).to_string(),
                edge_type: EdgeType::Implements,
            });
        }
    }
    let Some(body) = impl_item.child_by_field_name("body") else {
        return;
    };
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        if member.kind() != "function_item" {
            continue;
        }
        let Some(name_node) = member.child_by_field_name("name") else {
            continue;
        };
        let name = node_text(name_node, source);
        let id = if receiver.is_empty() {
            format!("{file_path}::{name}")
        } else {
            format!("{file_path}::{receiver}.{name}")
        };
        nodes.push(build_node(
            id,
            name,
            NodeType::Method,
            Lang::Rust,
            file_path,
            member,
            source,
        ));
    }
}

/// `Foo<T>` -> `Foo`, `&Foo` -> `Foo`.
fn base_type_name(ty: Node<'_>, source: &str) -> String {
    let text = node_text(ty, source);
    let text = text.trim_start_matches(['&', ' ']);
    match text.split_once('<') {
        Some((base, _)) => base.trim().to_string(),
        None => text.trim().to_string(),
    }
}
