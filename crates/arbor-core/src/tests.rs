//! Unit tests for the core data model

use std::path::Path;

use crate::exclude::ExcludeMatcher;
use crate::language::Lang;
use crate::model::{CodeEdge, CodeNode, EdgeType, NodeType, edge_id};

#[test]
fn edge_id_includes_type() {
    let calls = edge_id("funcA", "funcB", EdgeType::Calls);
    let uses = edge_id("funcA", "funcB", EdgeType::Uses);
    assert_eq!(calls, "funcA->funcB:calls");
    assert_eq!(uses, "funcA->funcB:uses");
    assert_ne!(calls, uses);
}

#[test]
fn edge_constructor_formats_id() {
    let edge = CodeEdge::new("a.go::main", "external::fmt.Println", EdgeType::Calls);
    assert_eq!(edge.id, "a.go::main->external::fmt.Println:calls");
    assert_eq!(edge.weight, 1.0);
}

#[test]
fn node_type_round_trips_through_str() {
    for nt in [
        NodeType::Function,
        NodeType::Method,
        NodeType::Class,
        NodeType::Struct,
        NodeType::Interface,
        NodeType::Enum,
        NodeType::Macro,
        NodeType::Variable,
        NodeType::Type,
        NodeType::Import,
        NodeType::Module,
    ] {
        assert_eq!(nt.as_str().parse::<NodeType>().unwrap(), nt);
    }
}

#[test]
fn edge_type_round_trips_through_str() {
    for et in [
        EdgeType::Calls,
        EdgeType::Imports,
        EdgeType::Uses,
        EdgeType::Extends,
        EdgeType::Implements,
        EdgeType::References,
    ] {
        assert_eq!(et.as_str().parse::<EdgeType>().unwrap(), et);
    }
}

#[test]
fn language_detection_follows_extension_table() {
    let cases = [
        ("main.c", Some(Lang::C)),
        ("main.h", Some(Lang::C)),
        ("main.cpp", Some(Lang::Cpp)),
        ("main.hxx", Some(Lang::Cpp)),
        ("main.go", Some(Lang::Go)),
        ("app.py", Some(Lang::Python)),
        ("app.mjs", Some(Lang::JavaScript)),
        ("app.tsx", Some(Lang::TypeScript)),
        ("lib.rs", Some(Lang::Rust)),
        ("Main.java", Some(Lang::Java)),
        ("core.cljc", Some(Lang::Clojure)),
        ("data.edn", Some(Lang::Clojure)),
        ("solve.jl", Some(Lang::Julia)),
        ("system.asd", Some(Lang::CommonLisp)),
        ("readme.md", None),
        ("Makefile", None),
    ];
    for (path, expected) in cases {
        assert_eq!(Lang::from_path(Path::new(path)), expected, "{path}");
    }
}

#[test]
fn exclude_matches_name_and_components() {
    let matcher = ExcludeMatcher::new(["node_modules", "*.min.js", "build?"]);
    assert!(matcher.is_excluded(Path::new("web/node_modules/react/index.js")));
    assert!(matcher.is_excluded(Path::new("dist/app.min.js")));
    assert!(matcher.is_excluded(Path::new("build1/out.c")));
    assert!(!matcher.is_excluded(Path::new("src/main.rs")));
    assert!(!matcher.is_excluded(Path::new("builder/out.c")));
}

#[test]
fn invalid_exclude_pattern_matches_nothing() {
    let matcher = ExcludeMatcher::new(["[unclosed"]);
    assert!(!matcher.is_excluded(Path::new("[unclosed")));
    assert!(!matcher.is_excluded(Path::new("anything.rs")));
}

#[test]
fn empty_matcher_excludes_nothing() {
    let matcher = ExcludeMatcher::default();
    assert!(matcher.is_empty());
    assert!(!matcher.is_excluded(Path::new("target/debug/main")));
}

#[test]
fn node_constructor_defaults() {
    let node = CodeNode::new("a.py::f", "f", NodeType::Function, "python", "a.py");
    assert_eq!(node.start_line, 1);
    assert_eq!(node.end_line, 1);
    assert!(node.annotations.is_empty());
    assert!(node.embedding.is_none());
}
