//! Call-edge extraction
//!
//! One AST walk per file. Each call site is attributed to the innermost
//! enclosing function by line containment, its callee name is resolved
//! through the file's symbol table, and a `calls` edge is emitted. Lisp
//! special forms are suppressed and literal forms short-circuit recursion.

use std::collections::HashSet;

use arbor_core::{CodeEdge, CodeNode, EdgeType, Lang, NodeType};
use tree_sitter::Node;

use crate::languages::lisp::is_numeric_literal;
use crate::registry::{node_text, start_line};
use crate::symbols::{ResolveContext, SymbolTable};

/// Recursion bound for adversarial inputs.
const MAX_DEPTH: usize = 50;

/// Node kinds that represent a call in the bracketed languages.
const CALL_KINDS: &[&str] = &[
    "call_expression",
    "call",
    "method_invocation",
    "invocation_expression",
];

/// Kinds the callee may appear under when no field names it.
const CALLEE_KINDS: &[&str] = &[
    "identifier",
    "field_identifier",
    "selector_expression",
    "member_expression",
    "field_expression",
    "attribute",
    "scoped_identifier",
    "qualified_identifier",
    "scoped_call_expression",
];

/// Lisp literal forms that cannot contain calls.
const LITERAL_KINDS: &[&str] = &[
    "str_lit",
    "num_lit",
    "kwd_lit",
    "char_lit",
    "bool_lit",
    "nil_lit",
    "regex_lit",
    "quoting_lit",
    "syn_quoting_lit",
];

/// Structural operators that look like calls in Lisp but are not.
const SPECIAL_FORMS: &[&str] = &[
    "def", "defn", "defn-", "defmacro", "defmethod", "defmulti", "defprotocol", "defrecord",
    "deftype", "defonce", "ns", "in-ns", "fn", "fn*", "let", "let*", "letfn", "if", "if-not",
    "if-let", "when", "when-not", "when-let", "while", "cond", "condp", "case", "do", "doseq",
    "dotimes", "for", "loop", "recur", "->", "->>", "some->", "some->>", "as->", "doto", "quote",
    "var", "try", "catch", "finally", "throw", "set!", "binding", "delay", "lazy-seq", "and",
    "or", "not", "require", "use", "import", "defun", "defvar", "defparameter", "defconstant",
    "defclass", "defstruct", "defgeneric", "defpackage", "in-package", "lambda", "setq", "setf",
    "progn", "block", "return-from", "unless", "dolist", "when-first",
];

struct FnRange {
    id: String,
    name: String,
    start: u32,
    end: u32,
}

pub struct EdgeExtractor<'a> {
    lang: Lang,
    source: &'a str,
    file_path: &'a str,
    functions: Vec<FnRange>,
    table: &'a dyn SymbolTable,
    /// Byte offsets of call forms already handled; nested Lisp walks can
    /// revisit a form.
    visited: HashSet<usize>,
    seen_edges: HashSet<String>,
    edges: Vec<CodeEdge>,
}

impl<'a> EdgeExtractor<'a> {
    pub fn new(
        lang: Lang,
        source: &'a str,
        file_path: &'a str,
        nodes: &[CodeNode],
        table: &'a dyn SymbolTable,
    ) -> Self {
        let functions = nodes
            .iter()
            .filter(|n| {
                matches!(
                    n.node_type,
                    NodeType::Function | NodeType::Method | NodeType::Macro
                )
            })
            .map(|n| FnRange {
                id: n.id.clone(),
                name: n.name.clone(),
                start: n.start_line,
                end: n.end_line,
            })
            .collect();
        EdgeExtractor {
            lang,
            source,
            file_path,
            functions,
            table,
            visited: HashSet::new(),
            seen_edges: HashSet::new(),
            edges: Vec::new(),
        }
    }

    pub fn run(mut self, root: Node<'_>) -> Vec<CodeEdge> {
        self.walk(root, 0);
        self.edges
    }

    fn walk(&mut self, node: Node<'_>, depth: usize) {
        if depth > MAX_DEPTH {
            return;
        }
        if self.lang.is_lisp() && LITERAL_KINDS.contains(&node.kind()) {
            return;
        }
        if self.lang.is_lisp() {
            if node.kind() == "list_lit" {
                self.handle_lisp_form(node);
            }
        } else if CALL_KINDS.contains(&node.kind()) {
            self.handle_call(node);
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, depth + 1);
        }
    }

    /// The innermost function whose line range contains the call. Functions
    /// per file are few, so a linear scan is fine.
    fn enclosing_function(&self, line: u32) -> Option<&FnRange> {
        self.functions
            .iter()
            .filter(|f| f.start <= line && line <= f.end)
            .min_by_key(|f| f.end - f.start)
    }

    fn handle_call(&mut self, call: Node<'_>) {
        if !self.visited.insert(call.start_byte()) {
            return;
        }
        let Some(callee) = self.callee_name(call) else {
            return;
        };
        self.emit(call, &callee);
    }

    fn handle_lisp_form(&mut self, form: Node<'_>) {
        if !self.visited.insert(form.start_byte()) {
            return;
        }
        let mut cursor = form.walk();
        let Some(head) = form
            .named_children(&mut cursor)
            .find(|c| c.kind() == "sym_lit")
        else {
            return;
        };
        // The operator must be in head position.
        if form
            .named_child(0)
            .map(|c| c.id() != head.id())
            .unwrap_or(true)
        {
            return;
        }
        let callee = node_text(head, self.source);
        if SPECIAL_FORMS.contains(&callee) || is_numeric_literal(callee) {
            return;
        }
        let callee = callee.to_string();
        self.emit(form, &callee);
    }

    fn emit(&mut self, call: Node<'_>, callee: &str) {
        let line = start_line(call);
        let (caller_id, caller_name) = match self.enclosing_function(line) {
            Some(f) => (f.id.clone(), f.name.clone()),
            None => return,
        };
        let ctx = ResolveContext {
            file_path: self.file_path,
            current_function: Some(&caller_name),
            namespace: None,
        };
        let (target, _found) = self.table.resolve(callee, &ctx);
        let edge = CodeEdge::new(caller_id, target, EdgeType::Calls);
        if self.seen_edges.insert(edge.id.clone()) {
            self.edges.push(edge);
        }
    }

    /// The callee is named by an AST field when the grammar has one, else by
    /// the first identifier-like child. Selector expressions keep their full
    /// textual path (`pkg.Func`, `obj->method`, `A::B`).
    fn callee_name(&self, call: Node<'_>) -> Option<String> {
        for field in ["function", "name", "method"] {
            if let Some(target) = call.child_by_field_name(field) {
                let text = node_text(target, self.source);
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
        }
        let mut cursor = call.walk();
        for child in call.named_children(&mut cursor) {
            if CALLEE_KINDS.contains(&child.kind()) {
                let text = node_text(child, self.source);
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
        }
        None
    }
}
