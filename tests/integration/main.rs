//! Integration tests for Arbor
//!
//! These tests drive the real pipeline end to end: scan, parse, embed with
//! the local provider, commit to SQLite, and query back.

use std::path::Path;
use std::sync::Arc;

use arbor_core::{EdgeType, NodeType};
use arbor_embed::{Embedder, LocalEmbedder};
use arbor_indexer::{Indexer, IndexerConfig};
use arbor_store::GraphStore;
use tokio_util::sync::CancellationToken;

async fn indexer_for(root: &Path) -> Indexer {
    let store = Arc::new(GraphStore::open_in_memory().unwrap());
    store.run_migrations().await.unwrap();
    let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new());
    Indexer::new(store, embedder, IndexerConfig::new(root))
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn indexes_a_mixed_language_tree() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "go/main.go",
        r#"package main

import "fmt"

/*@semantic
id: function::greet
summary: Greets a user by name
*/
func greet(name string) string {
	return "hello " + name
}

func main() {
	fmt.Println(greet("world"))
}
"#,
    );
    write(
        dir.path(),
        "py/calc.py",
        r#"def calculate_sum(numbers):
    """Calculate the sum of a list of numbers."""
    return sum(numbers)
"#,
    );
    write(
        dir.path(),
        "clj/core.clj",
        r#"(ns demo.core)

(defn helper [x]
  (inc x))

(defn caller [x]
  (helper x))
"#,
    );

    let indexer = indexer_for(dir.path()).await;
    let cancel = CancellationToken::new();
    let summary = indexer.run(&cancel).await.unwrap();
    assert_eq!(summary.files_indexed, 3);

    let store = indexer.store();

    // Go annotations made it through the whole pipeline.
    let greet = store.get_node("go/main.go::greet").await.unwrap().unwrap();
    assert_eq!(greet.node_type, NodeType::Function);
    assert_eq!(greet.annotations.get("id").unwrap(), "function::greet");
    assert_eq!(greet.annotations.get("summary").unwrap(), "Greets a user by name");

    // Python docstring.
    let calc = store.get_node("py/calc.py::calculate_sum").await.unwrap().unwrap();
    assert!(calc.doc_comment.contains("Calculate the sum"));

    // Clojure call edge resolved within the namespace.
    let edges = store.get_outgoing_edges("clj/core.clj::caller").await.unwrap();
    assert!(edges.iter().any(|e| {
        e.edge_type == EdgeType::Calls && e.to_id == "clj/core.clj::helper"
    }));

    // The call into greet is resolvable and traceable.
    let chain = store
        .trace_call_chain(&cancel, "go/main.go::main", "greet")
        .await
        .unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].id, "go/main.go::main->go/main.go::greet:calls");
}

#[tokio::test(flavor = "multi_thread")]
async fn semantic_search_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "lib.py",
        r#"def parse_config(path):
    return open(path).read()

def render_template(name):
    return f"<html>{name}</html>"
"#,
    );
    let indexer = indexer_for(dir.path()).await;
    let cancel = CancellationToken::new();
    indexer.run(&cancel).await.unwrap();

    let embedder = LocalEmbedder::new();
    let query = embedder
        .embed_single(&cancel, "def parse_config(path):\n    return open(path).read()")
        .await
        .unwrap();
    let hits = indexer
        .store()
        .semantic_search(&cancel, &query, 5)
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].node.name, "parse_config");
    for hit in &hits {
        assert!(hit.score > 0.0);
        assert_eq!(
            hit.node.embedding.as_ref().map(Vec::len),
            Some(query.len())
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn reindex_replaces_file_rows_atomically() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "app.py",
        "def old_one():\n    return 1\n\ndef old_two():\n    return old_one()\n",
    );
    let indexer = indexer_for(dir.path()).await;
    let cancel = CancellationToken::new();
    indexer.run(&cancel).await.unwrap();

    let store = indexer.store();
    assert_eq!(store.get_nodes_by_file("app.py").await.unwrap().len(), 2);
    assert!(!store.get_all_edges().await.unwrap().is_empty());

    // Bump the mod time past second granularity so the rewrite is seen.
    write(dir.path(), "app.py", "def brand_new():\n    return 3\n");
    let handle = std::fs::File::options()
        .append(true)
        .open(dir.path().join("app.py"))
        .unwrap();
    handle
        .set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(10))
        .unwrap();
    drop(handle);
    indexer.run(&cancel).await.unwrap();

    let nodes = store.get_nodes_by_file("app.py").await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name, "brand_new");
    // Old intra-file edge went away with its endpoints.
    let edges = store.get_all_edges().await.unwrap();
    assert!(
        edges.iter().all(|e| !e.from_id.contains("old_")),
        "stale edges: {edges:?}"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn callers_and_dependencies_across_files() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.py",
        "def shared():\n    return 1\n\ndef entry():\n    return shared()\n",
    );
    let indexer = indexer_for(dir.path()).await;
    let cancel = CancellationToken::new();
    indexer.run(&cancel).await.unwrap();

    let store = indexer.store();
    let callers = store.get_callers("a.py::shared").await.unwrap();
    assert_eq!(callers.len(), 1);
    assert_eq!(callers[0].name, "entry");

    let deps = store
        .get_transitive_dependencies(&cancel, "a.py::entry", 0)
        .await
        .unwrap();
    assert!(deps.iter().any(|n| n.id == "a.py::shared"));
}
