//! JavaScript / TypeScript structural extractor

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
            "export_statement" => {
                if let Some(decl) = child.child_by_field_name("declaration") {
                    handle(lang, decl, source, file_path, nodes, refs);
                } else {
                    walk(lang, child, source, file_path, nodes, refs);
                }
            }
            _ => handle(lang, child, source, file_path, nodes, refs),
        }
    }
}

fn handle(
    lang: Lang,
    child: Node<'_>,
    source: &str,
    file_path: &str,
    nodes: &mut Vec<CodeNode>,
    refs: &mut Vec<PendingRef>,
) {
    match child.kind() {
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name_node) = child.child_by_field_name("name") {
                let name = node_text(name_node, source);
                nodes.push(build_node(
                    format!("{file_path}::{name}"),
                    name,
                    NodeType::Function,
                    lang,
                    file_path,
                    child,
                    source,
                ));
            }
            if let Some(body) = child.child_by_field_name("body") {
                collect_nested_functions(lang, body, source, file_path, nodes);
            }
        }
        "class_declaration" | "abstract_class_declaration" => {
            handle_class(lang, child, source, file_path, nodes, refs);
        }
        "interface_declaration" => {
            if let Some(name_node) = child.child_by_field_name("name") {
                let name = node_text(name_node, source);
                nodes.push(build_node(
                    format!("{file_path}::{name}"),
                    name,
                    NodeType::Interface,
                    lang,
                    file_path,
                    child,
                    source,
                ));
            }
        }
        "enum_declaration" => {
            if let Some(name_node) = child.child_by_field_name("name") {
                let name = node_text(name_node, source);
                nodes.push(build_node(
                    format!("{file_path}::{name}"),
                    name,
                    NodeType::Enum,
                    lang,
                    file_path,
                    child,
                    source,
                ));
            }
        }
        "type_alias_declaration" => {
            if let Some(name_node) = child.child_by_field_name("name") {
                let name = node_text(name_node, source);
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
        "lexical_declaration" | "variable_declaration" => {
            let mut decl_cursor = child.walk();
            for declarator in child.named_children(&mut decl_cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let Some(name_node) = declarator.child_by_field_name("name") else {
                    continue;
                };
                let name = node_text(name_node, source);
                let is_function = declarator
                    .child_by_field_name("value")
                    .map(|v| matches!(v.kind(), "arrow_function" | "function_expression"))
                    .unwrap_or(false);
                let node_type = if is_function {
                    NodeType::Function
                } else {
                    NodeType::Variable
                };
                nodes.push(build_node(
                    format!("{file_path}::{name}"),
                    name,
                    node_type,
                    lang,
                    file_path,
                    child,
                    source,
                ));
            }
        }
        "import_statement" => {
            if let Some(source_node) = child.child_by_field_name("source") {
                let module = node_text(source_node, source)
                    .trim_matches(['"', '\''])
                    .to_string();
                let row = start_line(child);
                let id = format!("{file_path}::import_{row}");
                nodes.push(build_node(
                    id.clone(),
                    &module,
                    NodeType::Import,
                    lang,
                    file_path,
                    child,
                    source,
                ));
                refs.push(PendingRef {
                    from_id: id,
                    target: module,
                    edge_type: EdgeType::Imports,
                });
            }
        }
        _ => {}
    }
}

/// Functions declared inside another function get the row-disambiguated ID
/// form, since the same name can recur in sibling scopes.
fn collect_nested_functions(
    lang: Lang,
    body: Node<'_>,
    source: &str,
    file_path: &str,
    nodes: &mut Vec<CodeNode>,
) {
    let mut cursor = body.walk();
    for child in body.named_children(&mut cursor) {
        if matches!(
            child.kind(),
            "function_declaration" | "generator_function_declaration"
        ) {
            if let Some(name_node) = child.child_by_field_name("name") {
                let name = node_text(name_node, source);
                let row = start_line(child);
                nodes.push(build_node(
                    format!("{file_path}::method_{name}_{row}"),
                    name,
                    NodeType::Function,
                    lang,
                    file_path,
                    child,
                    source,
                ));
            }
            if let Some(inner) = child.child_by_field_name("body") {
                collect_nested_functions(lang, inner, source, file_path, nodes);
            }
        } else {
            collect_nested_functions(lang, child, source, file_path, nodes);
        }
    }
}

fn handle_class(
    lang: Lang,
    class: Node<'_>,
    source: &str,
    file_path: &str,
    nodes: &mut Vec<CodeNode>,
    refs: &mut Vec<PendingRef>,
) {
    let Some(name_node) = class.child_by_field_name("name") else {
        return;
    };
    let class_name = node_text(name_node, source).to_string();
    let class_id = format!("{file_path}::{class_name}");
    nodes.push(build_node(
        class_id.clone(),
        &class_name,
        NodeType::Class,
        lang,
        file_path,
        class,
        source,
    ));

    // `extends` / `implements` clauses live under class_heritage.
    let mut cursor = class.walk();
    for child in class.children(&mut cursor) {
        if child.kind() != "class_heritage" {
            continue;
        }
        let mut heritage_cursor = child.walk();
        for clause in child.children(&mut heritage_cursor) {
            match clause.kind() {
                "extends_clause" => {
                    push_heritage(&class_id, clause, source, EdgeType::Extends, refs);
                }
                "implements_clause" => {
                    push_heritage(&class_id, clause, source, EdgeType::Implements, refs);
                }
                "identifier" | "member_expression" => {
                    // JavaScript grammar: heritage holds the expression directly.
                    refs.push(PendingRef {
                        from_id: class_id.clone(),
                        target: node_text(clause, source).to_string(),
                        edge_type: EdgeType::Extends,
                    });
                }
                _ => {}
            }
        }
    }

    if let Some(body) = class.child_by_field_name("body") {
        let mut body_cursor = body.walk();
        for member in body.named_children(&mut body_cursor) {
            if member.kind() != "method_definition" {
                continue;
            }
            let Some(method_name) = member.child_by_field_name("name") else {
                continue;
            };
            let name = node_text(method_name, source);
            nodes.push(build_node(
                format!("{file_path}::{class_name}.{name}"),
                name,
                NodeType::Method,
                lang,
                file_path,
                member,
                source,
            ));
        }
    }
}

fn push_heritage(
    class_id: &str,
    clause: Node<'_>,
    source: &str,
    edge_type: EdgeType,
    refs: &mut Vec<PendingRef>,
) {
    let mut cursor = clause.walk();
    for target in clause.named_children(&mut cursor) {
        if matches!(
            target.kind(),
            "identifier" | "member_expression" | "type_identifier" | "generic_type"
        ) {
            refs.push(PendingRef {
                from_id: class_id.to_string(),
                target: node_text(target, source).to_string(),
                edge_type,
            });
        }
    }
}
