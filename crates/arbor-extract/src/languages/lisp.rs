//! Clojure / Common Lisp structural extractor
//!
//! Both grammars expose the same s-expression node kinds (`list_lit`,
//! `sym_lit`, `str_lit`, ...), so one extractor covers the family. An
//! entity's name is the second `sym_lit` child of its defining form.

use arbor_core::{CodeNode, Lang, NodeType};
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
    let refs = Vec::new();
    let mut cursor = root.walk();
    for form in root.named_children(&mut cursor) {
        if form.kind() == "list_lit" {
            handle_form(lang, form, source, file_path, &mut nodes);
        }
    }
    (nodes, refs)
}

fn handle_form(
    lang: Lang,
    form: Node<'_>,
    source: &str,
    file_path: &str,
    nodes: &mut Vec<CodeNode>,
) {
    let Some(head) = first_symbol(form) else {
        return;
    };
    let operator = node_text(head, source);
    let node_type = match operator {
        "defn" | "defn-" | "defmulti" | "defun" | "defgeneric" => NodeType::Function,
        "defmacro" => NodeType::Macro,
        "defmethod" => NodeType::Method,
        "def" | "defonce" | "defvar" | "defparameter" | "defconstant" => NodeType::Variable,
        "defrecord" | "deftype" | "defclass" => NodeType::Class,
        "defstruct" => NodeType::Struct,
        "defprotocol" => NodeType::Interface,
        "ns" | "defpackage" => NodeType::Module,
        _ => return,
    };
    let Some(name_node) = second_symbol(form) else {
        return;
    };
    let name = node_text(name_node, source)
        .trim_start_matches([':', '\''])
        .to_string();
    if name.is_empty() {
        return;
    }
    let id = match node_type {
        NodeType::Macro => format!("{file_path}::macro_{name}"),
        NodeType::Method => {
            // Multimethod implementations recur per dispatch value.
            let row = start_line(form);
            format!("{file_path}::method_{name}_{row}")
        }
        NodeType::Module => format!("{file_path}::ns_{name}"),
        _ => format!("{file_path}::{name}"),
    };
    nodes.push(build_node(
        id,
        &name,
        node_type,
        lang,
        file_path,
        form,
        source,
    ));
}

/// First `sym_lit` named child (the operator position).
fn first_symbol(form: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = form.walk();
    form.named_children(&mut cursor)
        .find(|c| c.kind() == "sym_lit")
}

/// Second `sym_lit` named child (the name position). A `defstruct` may wrap
/// its name and options in a list, in which case the list's head names the
/// entity.
fn second_symbol(form: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = form.walk();
    let mut seen_first = false;
    for child in form.named_children(&mut cursor) {
        match child.kind() {
            "sym_lit" => {
                if seen_first {
                    return Some(child);
                }
                seen_first = true;
            }
            "list_lit" if seen_first => {
                return first_symbol(child);
            }
            _ => {}
        }
    }
    None
}

/// True when `text` forms a single numeric literal. Radix literals
/// (`<base>r<digits>`) require a base in [2, 36] and digits valid for that
/// base; anything else is not a single number.
pub fn is_numeric_literal(text: &str) -> bool {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    if body.is_empty() {
        return false;
    }
    if let Some((base_str, digits)) = body
        .split_once('r')
        .or_else(|| body.split_once('R'))
        .filter(|(base, _)| !base.is_empty() && base.chars().all(|c| c.is_ascii_digit()))
    {
        let Ok(base) = base_str.parse::<u32>() else {
            return false;
        };
        if !(2..=36).contains(&base) || digits.is_empty() {
            return false;
        }
        return digits.chars().all(|c| c.to_digit(36).is_some_and(|d| d < base));
    }
    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    if let Some((numerator, denominator)) = body.split_once('/') {
        return !numerator.is_empty()
            && !denominator.is_empty()
            && numerator.chars().all(|c| c.is_ascii_digit())
            && denominator.chars().all(|c| c.is_ascii_digit());
    }
    // Decimal integers and floats, with optional exponent and the Clojure
    // M/N suffixes.
    let body = body
        .strip_suffix(['M', 'N'])
        .unwrap_or(body);
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot && !seen_exp => seen_dot = true,
            'e' | 'E' if seen_digit && !seen_exp => {
                seen_exp = true;
                if matches!(chars.peek(), Some('+') | Some('-')) {
                    chars.next();
                }
            }
            _ => return false,
        }
    }
    seen_digit
}
