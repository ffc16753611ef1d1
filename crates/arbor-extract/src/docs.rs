//! Doc-comment and annotation mining
//!
//! Doc comments come from the immediate previous-sibling comment run, from
//! Python-style docstrings, or from Lisp doc strings. Annotation blocks are
//! comment regions containing `@semantic` or `@annotation` followed by
//! `key: value` lines drawn from a bounded vocabulary.

use std::collections::HashMap;
use std::sync::OnceLock;

use arbor_core::Lang;
use regex::Regex;
use tree_sitter::Node;

use crate::registry::node_text;

/// Accepted annotation keys, all lowercase. Unknown keys are dropped.
pub const ANNOTATION_KEYS: &[&str] = &[
    "id",
    "kind",
    "name",
    "summary",
    "responsibility",
    "inputs",
    "outputs",
    "side_effects",
    "calls",
    "called_by",
    "data_reads",
    "data_writes",
    "lifetime",
    "invariants",
    "error_handling",
    "thread_safety",
    "related_symbols",
    "tags",
    "description",
    "returns",
    "params",
    "throws",
    "see",
    "since",
    "deprecated",
    "author",
    "version",
];

fn key_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*:\s*(.*)$").unwrap())
}

/// Extract `(doc_comment, annotations)` for an entity node.
pub fn mine(node: Node<'_>, source: &str, lang: Lang) -> (String, HashMap<String, String>) {
    let raw = raw_doc(node, source, lang);
    let doc = clean_comment(&raw);
    let mut annotations = parse_annotations(&raw);
    if annotations.is_empty() {
        // The block may live inside the entity body rather than above it.
        let body = node_text(node, source);
        if body.contains("@semantic") || body.contains("@annotation") {
            annotations = parse_annotations(body);
        }
    }
    (doc, annotations)
}

/// The raw (syntax-bearing) doc text for a node, preferring the preceding
/// comment run, then language-specific doc strings.
fn raw_doc(node: Node<'_>, source: &str, lang: Lang) -> String {
    // Contiguous run of comment siblings directly above the node, in source
    // order. Line-comment docs arrive as one sibling per line.
    let mut parts: Vec<String> = Vec::new();
    let mut prev = node.prev_sibling();
    while let Some(sib) = prev {
        if !sib.kind().contains("comment") {
            break;
        }
        parts.push(node_text(sib, source).to_string());
        prev = sib.prev_sibling();
    }
    if !parts.is_empty() {
        parts.reverse();
        return parts.join("\n");
    }

    if lang == Lang::Python {
        if let Some(doc) = python_docstring(node, source) {
            return doc;
        }
    }
    if lang.is_lisp() {
        if let Some(doc) = lisp_doc_string(node, source) {
            return doc;
        }
    }
    String::new()
}

/// First string-literal statement of a `def`/`class` body block.
fn python_docstring(node: Node<'_>, source: &str) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() != "string" {
        return None;
    }
    Some(node_text(expr, source).to_string())
}

/// First string literal after the name symbol, before any other list or
/// vector form.
fn lisp_doc_string(node: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    let mut seen_syms = 0usize;
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "sym_lit" => seen_syms += 1,
            "str_lit" if seen_syms >= 2 => {
                return Some(node_text(child, source).to_string());
            }
            "list_lit" | "vec_lit" | "map_lit" => return None,
            _ => {}
        }
    }
    None
}

/// Strip comment syntax and rejoin interior lines with single spaces.
pub fn clean_comment(raw: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in raw.lines() {
        let line = strip_comment_markers(line);
        if !line.is_empty() {
            out.push(line);
        }
    }
    out.join(" ")
}

fn strip_comment_markers(line: &str) -> &str {
    let mut s = line.trim();
    loop {
        let before = s;
        // Closing delimiters first: a line that is only `*/` must reduce
        // to empty before the leading `*` strip can eat its star.
        s = s.trim_end_matches("*/").trim_end_matches("\"\"\"");
        s = s.trim();
        s = s.trim_start_matches("/**").trim_start_matches("/*");
        s = s.trim_start_matches("///").trim_start_matches("//");
        s = s.trim_start_matches("\"\"\"");
        s = s.trim_start_matches(";;").trim_start_matches(';');
        s = s.trim_start_matches('#');
        s = s.trim_start_matches('*');
        s = s.trim();
        if s == before {
            break;
        }
    }
    // Single- and triple-quoted docstrings keep their quotes in the AST.
    s.trim_start_matches(['"', '\''])
        .trim_end_matches(['"', '\''])
        .trim()
}

/// Line-scan an annotation block for `key: value` pairs.
///
/// A line whose key is not in the vocabulary is not a key line; when it
/// follows a known key it extends that key's value, which gives multi-line
/// list fields without a list syntax.
pub fn parse_annotations(text: &str) -> HashMap<String, String> {
    if !text.contains("@semantic") && !text.contains("@annotation") {
        return HashMap::new();
    }
    let mut out: HashMap<String, String> = HashMap::new();
    let mut current: Option<String> = None;
    let mut in_block = false;
    for line in text.lines() {
        let stripped = strip_comment_markers(line);
        if !in_block {
            if let Some(pos) = stripped
                .find("@semantic")
                .map(|p| p + "@semantic".len())
                .or_else(|| stripped.find("@annotation").map(|p| p + "@annotation".len()))
            {
                in_block = true;
                let rest = stripped[pos..].trim();
                if !rest.is_empty() {
                    scan_line(rest, &mut out, &mut current);
                }
            }
            continue;
        }
        scan_line(stripped, &mut out, &mut current);
    }
    out
}

fn scan_line(line: &str, out: &mut HashMap<String, String>, current: &mut Option<String>) {
    if line.is_empty() {
        return;
    }
    if let Some(caps) = key_value_re().captures(line) {
        let key = caps[1].to_lowercase();
        if ANNOTATION_KEYS.contains(&key.as_str()) {
            out.insert(key.clone(), caps[2].trim().to_string());
            *current = Some(key);
            return;
        }
    }
    if let Some(key) = current.as_ref() {
        let entry = out.entry(key.clone()).or_default();
        if entry.is_empty() {
            *entry = line.to_string();
        } else {
            entry.push(' ');
            entry.push_str(line);
        }
    }
}
