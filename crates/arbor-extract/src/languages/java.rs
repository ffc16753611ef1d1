//! Java structural extractor

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
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "class_declaration" | "record_declaration" => {
                handle_type(child, NodeType::Class, source, file_path, &mut nodes, &mut refs);
            }
            "interface_declaration" | "annotation_type_declaration" => {
                handle_type(
                    child,
                    NodeType::Interface,
                    source,
                    file_path,
                    &mut nodes,
                    &mut refs,
                );
            }
            "enum_declaration" => {
                handle_type(child, NodeType::Enum, source, file_path, &mut nodes, &mut refs);
            }
            "import_declaration" => {
                let target = import_target(child, source);
                if !target.is_empty() {
                    let row = start_line(child);
                    let id = format!("{file_path}::import_{row}");
                    nodes.push(build_node(
                        id.clone(),
                        &target,
                        NodeType::Import,
                        Lang::Java,
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
    (nodes, refs)
}

/// The named type behind a field declaration, ignoring primitives.
/// `List<String>` refers to `List`.
fn reference_type_name(field_type: Node<'_>, source: &str) -> Option<String> {
    match field_type.kind() {
        "type_identifier" | "scoped_type_identifier" => {
            Some(node_text(field_type, source).to_string())
        }
        "generic_type" => {
            let head = field_type.named_child(0)?;
            Some(node_text(head, source).to_string())
        }
        "array_type" => {
            let element = field_type.child_by_field_name("element")?;
            reference_type_name(element, source)
        }
        _ => None,
    }
}

fn import_target(decl: Node<'_>, source: &str) -> String {
    let mut cursor = decl.walk();
    for child in decl.named_children(&mut cursor) {
        if matches!(child.kind(), "scoped_identifier" | "identifier") {
            return node_text(child, source).to_string();
        }
    }
    String::new()
}

fn handle_type(
    decl: Node<'_>,
    node_type: NodeType,
    source: &str,
    file_path: &str,
    nodes: &mut Vec<CodeNode>,
    refs: &mut Vec<PendingRef>,
) {
    let Some(name_node) = decl.child_by_field_name("name") else {
        return;
    };
    let type_name = node_text(name_node, source).to_string();
    let type_id = format!("{file_path}::{type_name}");
    nodes.push(build_node(
        type_id.clone(),
        &type_name,
        node_type,
        Lang::Java,
        file_path,
        decl,
        source,
    ));

    if let Some(superclass) = decl.child_by_field_name("superclass") {
        let mut cursor = superclass.walk();
        for ty in superclass.named_children(&mut cursor) {
            refs.push(PendingRef {
                from_id: type_id.clone(),
                target: node_text(ty, source).to_string(),
                edge_type: EdgeType::Extends,
            });
        }
    }
    if let Some(interfaces) = decl.child_by_field_name("interfaces") {
        let mut cursor = interfaces.walk();
        for list in interfaces.named_children(&mut cursor) {
            if list.kind() != "type_list" {
                continue;
            }
            let mut list_cursor = list.walk();
            for ty in list.named_children(&mut list_cursor) {
                refs.push(PendingRef {
                    from_id: type_id.clone(),
                    target: node_text(ty, source).to_string(),
                    edge_type: EdgeType::Implements,
                });
            }
        }
    }

    let Some(body) = decl.child_by_field_name("body") else {
        return;
    };
    let mut body_cursor = body.walk();
    for member in body.named_children(&mut body_cursor) {
        match member.kind() {
            "method_declaration" | "constructor_declaration" => {
                let Some(method_name) = member.child_by_field_name("name") else {
                    continue;
                };
                let name = node_text(method_name, source);
                nodes.push(build_node(
                    format!("{file_path}::{type_name}.{name}"),
                    name,
                    NodeType::Method,
                    Lang::Java,
                    file_path,
                    member,
                    source,
                ));
            }
            "field_declaration" => {
                if let Some(field_type) = member.child_by_field_name("type") {
                    if let Some(target) = reference_type_name(field_type, source) {
                        refs.push(PendingRef {
                            from_id: type_id.clone(),
                            target,
                            edge_type: EdgeType::References,
                        });
                    }
                }
                let mut field_cursor = member.walk();
                for declarator in member.named_children(&mut field_cursor) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    let Some(field_name) = declarator.child_by_field_name("name") else {
                        continue;
                    };
                    let name = node_text(field_name, source);
                    nodes.push(build_node(
                        format!("{file_path}::{type_name}.{name}"),
                        name,
                        NodeType::Variable,
                        Lang::Java,
                        file_path,
                        member,
                        source,
                    ));
                }
            }
            "class_declaration" => {
                // Nested classes keep their own plain ID.
                handle_type(member, NodeType::Class, source, file_path, nodes, refs);
            }
            _ => {}
        }
    }
}
