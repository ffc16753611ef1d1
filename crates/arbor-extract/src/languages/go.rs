//! Go structural extractor

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
            "function_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = node_text(name_node, source);
                    nodes.push(build_node(
                        format!("{file_path}::{name}"),
                        name,
                        NodeType::Function,
                        Lang::Go,
                        file_path,
                        child,
                        source,
                    ));
                }
            }
            "method_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = node_text(name_node, source);
                    let receiver = receiver_type(child, source).unwrap_or_default();
                    let id = if receiver.is_empty() {
                        format!("{file_path}::{name}")
                    } else {
                        format!("{file_path}::{receiver}.{name}")
                    };
                    nodes.push(build_node(
                        id,
                        name,
                        NodeType::Method,
                        Lang::Go,
                        file_path,
                        child,
                        source,
                    ));
                }
            }
            "type_declaration" => {
                let mut spec_cursor = child.walk();
                for spec in child.named_children(&mut spec_cursor) {
                    if spec.kind() != "type_spec" && spec.kind() != "type_alias" {
                        continue;
                    }
                    let Some(name_node) = spec.child_by_field_name("name") else {
                        continue;
                    };
                    let name = node_text(name_node, source);
                    let node_type = match spec.child_by_field_name("type").map(|t| t.kind()) {
                        Some("struct_type") => NodeType::Struct,
                        Some("interface_type") => NodeType::Interface,
                        _ => NodeType::Type,
                    };
                    let id = format!("{file_path}::{name}");
                    if let Some(body) = spec.child_by_field_name("type") {
                        collect_field_references(&id, body, source, &mut refs);
                    }
                    nodes.push(build_node(
                        id,
                        name,
                        node_type,
                        Lang::Go,
                        file_path,
                        child,
                        source,
                    ));
                }
            }
            "import_declaration" => {
                collect_imports(child, source, file_path, &mut nodes, &mut refs);
            }
            "var_declaration" | "const_declaration" => {
                let mut spec_cursor = child.walk();
                for spec in child.named_children(&mut spec_cursor) {
                    if spec.kind() != "var_spec" && spec.kind() != "const_spec" {
                        continue;
                    }
                    let Some(name_node) = spec.child_by_field_name("name") else {
                        continue;
                    };
                    let name = node_text(name_node, source);
                    nodes.push(build_node(
                        format!("{file_path}::{name}"),
                        name,
                        NodeType::Variable,
                        Lang::Go,
                        file_path,
                        child,
                        source,
                    ));
                }
            }
            _ => {}
        }
    }
    (nodes, refs)
}

fn collect_imports(
    decl: Node<'_>,
    source: &str,
    file_path: &str,
    nodes: &mut Vec<CodeNode>,
    refs: &mut Vec<PendingRef>,
) {
    let mut stack = vec![decl];
    while let Some(node) = stack.pop() {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "import_spec" => {
                    let Some(path_node) = child.child_by_field_name("path") else {
                        continue;
                    };
                    let path = node_text(path_node, source).trim_matches('"').to_string();
                    let row = start_line(child);
                    let id = format!("{file_path}::import_{row}");
                    nodes.push(build_node(
                        id.clone(),
                        &path,
                        NodeType::Import,
                        Lang::Go,
                        file_path,
                        child,
                        source,
                    ));
                    refs.push(PendingRef {
                        from_id: id,
                        target: path,
                        edge_type: EdgeType::Imports,
                    });
                }
                "import_spec_list" => stack.push(child),
                _ => {}
            }
        }
    }
}

/// Named types appearing in struct fields and interface embeds become
/// `references` edges from the declaring type.
fn collect_field_references(
    type_id: &str,
    body: Node<'_>,
    source: &str,
    refs: &mut Vec<PendingRef>,
) {
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "type_identifier" => {
                    let target = node_text(child, source);
                    if !is_builtin_go_type(target) {
                        refs.push(PendingRef {
                            from_id: type_id.to_string(),
                            target: target.to_string(),
                            edge_type: EdgeType::References,
                        });
                    }
                }
                "qualified_type" => {
                    refs.push(PendingRef {
                        from_id: type_id.to_string(),
                        target: node_text(child, source).to_string(),
                        edge_type: EdgeType::References,
                    });
                }
                _ => stack.push(child),
            }
        }
    }
}

fn is_builtin_go_type(name: &str) -> bool {
    matches!(
        name,
        "bool"
            | "byte"
            | "complex64"
            | "complex128"
            | "error"
            | "float32"
            | "float64"
            | "int"
            | "int8"
            | "int16"
            | "int32"
            | "int64"
            | "rune"
            | "string"
            | "uint"
            | "uint8"
            | "uint16"
            | "uint32"
            | "uint64"
            | "uintptr"
            | "any"
    )
}

/// Receiver type name with any pointer stripped: `(s *Server)` -> `Server`.
fn receiver_type(method: Node<'_>, source: &str) -> Option<String> {
    let receiver = method.child_by_field_name("receiver")?;
    let param = receiver.named_child(0)?;
    let ty = param.child_by_field_name("type")?;
    let ty = if ty.kind() == "pointer_type" {
        ty.named_child(0)?
    } else {
        ty
    };
    Some(node_text(ty, source).trim_start_matches('*').to_string())
}
