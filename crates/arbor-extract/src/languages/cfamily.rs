//! C / C++ structural extractor
//!
//! Names can nest arbitrarily deep through pointer, array and parenthesized
//! declarators, so name extraction unwraps the declarator chain rather than
//! reading a single field.

use arbor_core::{CodeNode, EdgeType, Lang, NodeType};
use tree_sitter::Node;

use super::{PendingRef, build_node};
use crate::registry::{node_text, start_line};

pub fn extract(
    lang: Lang,
    root: Node<'_>,
    source: &str,
    file_path: &str,
) -> (Vec<CodeNode>, Vec<PendingRef>) {
    let mut nodes = Vec::new();
    let mut refs = Vec::new();
    walk(lang, root, source, file_path, &mut nodes, &mut refs);
    (nodes, refs)
}

fn walk(
    lang: Lang,
    node: Node<'_>,
    source: &str,
    file_path: &str,
    nodes: &mut Vec<CodeNode>,
    refs: &mut Vec<PendingRef>,
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "function_definition" => {
                handle_function(lang, child, source, file_path, nodes);
            }
            "struct_specifier" | "union_specifier" => {
                handle_record(lang, child, NodeType::Struct, source, file_path, nodes, refs);
            }
            "class_specifier" => {
                handle_record(lang, child, NodeType::Class, source, file_path, nodes, refs);
            }
            "enum_specifier" => {
                handle_record(lang, child, NodeType::Enum, source, file_path, nodes, refs);
            }
            "type_definition" => {
                if let Some(name_node) = child.child_by_field_name("declarator") {
                    let name_node = unwrap_declarator(name_node).unwrap_or(name_node);
                    let name = node_text(name_node, source);
                    if !name.is_empty() {
                        nodes.push(build_node(
                            format!("{file_path}::{name}"),
                            name,
                            NodeType::Type,
                            lang,
                            file_path,
                            child,
                            source,
                        ));
                    }
                }
            }
            "preproc_def" | "preproc_function_def" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = node_text(name_node, source);
                    nodes.push(build_node(
                        format!("{file_path}::macro_{name}"),
                        name,
                        NodeType::Macro,
                        lang,
                        file_path,
                        child,
                        source,
                    ));
                }
            }
            "preproc_include" => {
                if let Some(path) = child.child_by_field_name("path") {
                    let target = node_text(path, source)
                        .trim_matches(['"', '<', '>'])
                        .to_string();
                    let row = start_line(child);
                    let id = format!("{file_path}::import_{row}");
                    nodes.push(build_node(
                        id.clone(),
                        &target,
                        NodeType::Import,
                        lang,
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
            "namespace_definition" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = node_text(name_node, source);
                    nodes.push(build_node(
                        format!("{file_path}::ns_{name}"),
                        name,
                        NodeType::Module,
                        lang,
                        file_path,
                        child,
                        source,
                    ));
                }
                if let Some(body) = child.child_by_field_name("body") {
                    walk(lang, body, source, file_path, nodes, refs);
                }
            }
            "declaration" => {
                handle_global(lang, child, source, file_path, nodes);
            }
            "template_declaration" | "linkage_specification" | "declaration_list"
            | "preproc_if" | "preproc_ifdef" => {
                walk(lang, child, source, file_path, nodes, refs);
            }
            _ => {}
        }
    }
}

fn handle_function(
    lang: Lang,
    def: Node<'_>,
    source: &str,
    file_path: &str,
    nodes: &mut Vec<CodeNode>,
) {
    let Some(declarator) = def.child_by_field_name("declarator") else {
        return;
    };
    let Some(name_node) = unwrap_declarator(declarator) else {
        return;
    };
    let full_name = node_text(name_node, source);
    if full_name.is_empty() {
        return;
    }
    // `Class::method` definitions become methods keyed `Class.method`.
    if let Some((scope, method)) = full_name.rsplit_once("::") {
        nodes.push(build_node(
            format!("{file_path}::{scope}.{method}"),
            method,
            NodeType::Method,
            lang,
            file_path,
            def,
            source,
        ));
    } else {
        nodes.push(build_node(
            format!("{file_path}::{full_name}"),
            full_name,
            NodeType::Function,
            lang,
            file_path,
            def,
            source,
        ));
    }
}

/// File-scope variable declarations. Prototypes (declarations whose
/// declarator chain passes through a function declarator) are skipped; the
/// definition carries the node.
fn handle_global(
    lang: Lang,
    decl: Node<'_>,
    source: &str,
    file_path: &str,
    nodes: &mut Vec<CodeNode>,
) {
    let mut cursor = decl.walk();
    for child in decl.named_children(&mut cursor) {
        let declarator = match child.kind() {
            "init_declarator" | "identifier" | "pointer_declarator" | "array_declarator" => child,
            _ => continue,
        };
        if contains_function_declarator(declarator) {
            continue;
        }
        let Some(name_node) = unwrap_declarator_or_self(declarator) else {
            continue;
        };
        let name = node_text(name_node, source);
        if name.is_empty() {
            continue;
        }
        nodes.push(build_node(
            format!("{file_path}::{name}"),
            name,
            NodeType::Variable,
            lang,
            file_path,
            decl,
            source,
        ));
    }
}

fn contains_function_declarator(node: Node<'_>) -> bool {
    if node.kind() == "function_declarator" {
        return true;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() != "initializer_list" && contains_function_declarator(child) {
            return true;
        }
    }
    false
}

fn unwrap_declarator_or_self(node: Node<'_>) -> Option<Node<'_>> {
    if node.kind() == "identifier" {
        return Some(node);
    }
    unwrap_declarator(node)
}

fn handle_record(
    lang: Lang,
    spec: Node<'_>,
    node_type: NodeType,
    source: &str,
    file_path: &str,
    nodes: &mut Vec<CodeNode>,
    refs: &mut Vec<PendingRef>,
) {
    // A specifier without a body is a reference, not a definition.
    if spec.child_by_field_name("body").is_none() {
        return;
    }
    let Some(name_node) = spec.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source).to_string();
    let id = format!("{file_path}::{name}");
    nodes.push(build_node(
        id.clone(),
        &name,
        node_type,
        lang,
        file_path,
        spec,
        source,
    ));

    let mut cursor = spec.walk();
    for child in spec.children(&mut cursor) {
        if child.kind() != "base_class_clause" {
            continue;
        }
        let mut base_cursor = child.walk();
        for base in child.named_children(&mut base_cursor) {
            if matches!(base.kind(), "type_identifier" | "qualified_identifier") {
                refs.push(PendingRef {
                    from_id: id.clone(),
                    target: node_text(base, source).to_string(),
                    edge_type: EdgeType::Extends,
                });
            }
        }
    }

    // C++ in-class method definitions.
    if node_type == NodeType::Class {
        if let Some(body) = spec.child_by_field_name("body") {
            let mut body_cursor = body.walk();
            for member in body.named_children(&mut body_cursor) {
                if member.kind() != "function_definition" {
                    continue;
                }
                let Some(declarator) = member.child_by_field_name("declarator") else {
                    continue;
                };
                let Some(method_name) = unwrap_declarator(declarator) else {
                    continue;
                };
                let method = node_text(method_name, source);
                if method.is_empty() {
                    continue;
                }
                nodes.push(build_node(
                    format!("{file_path}::{name}.{method}"),
                    method,
                    NodeType::Method,
                    lang,
                    file_path,
                    member,
                    source,
                ));
            }
        }
    }
}

/// Unwrap nested declarators down to the identifier that names the entity.
fn unwrap_declarator(declarator: Node<'_>) -> Option<Node<'_>> {
    let mut current = declarator;
    loop {
        match current.kind() {
            "identifier" | "field_identifier" | "type_identifier" | "qualified_identifier"
            | "operator_name" | "destructor_name" => return Some(current),
            "function_declarator" | "pointer_declarator" | "array_declarator"
            | "parenthesized_declarator" | "reference_declarator" | "init_declarator" => {
                current = current
                    .child_by_field_name("declarator")
                    .or_else(|| current.named_child(0))?;
            }
            _ => {
                current = current.child_by_field_name("declarator")?;
            }
        }
    }
}
