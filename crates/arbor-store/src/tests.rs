//! Unit tests for the storage layer

use std::sync::Arc;

use arbor_core::{CodeEdge, CodeNode, EdgeType, FileMetadata, NodeType};
use tokio_util::sync::CancellationToken;

use crate::locks::FileLockMap;
use crate::{GraphStore, StoreError};

async fn open_store() -> GraphStore {
    let store = GraphStore::open_in_memory().unwrap();
    store.run_migrations().await.unwrap();
    store
}

fn node(id: &str, file: &str) -> CodeNode {
    let name = id.rsplit("::").next().unwrap_or(id).to_string();
    CodeNode::new(id, name, NodeType::Function, "go", file)
}

fn node_with_embedding(id: &str, file: &str, embedding: Vec<f32>) -> CodeNode {
    let mut n = node(id, file);
    n.embedding = Some(embedding);
    n
}

#[tokio::test]
async fn migrations_run_twice_without_damage() {
    let store = open_store().await;
    store.run_migrations().await.unwrap();
    store.upsert_node(&node("a.go::f", "a.go")).await.unwrap();
    store.run_migrations().await.unwrap();
    assert_eq!(store.node_count().await.unwrap(), 1);
}

#[tokio::test]
async fn upsert_and_get_node_round_trip() {
    let store = open_store().await;
    let mut original = node("a.go::f", "a.go");
    original.doc_comment = "Does a thing".to_string();
    original
        .annotations
        .insert("summary".to_string(), "a thing".to_string());
    original.embedding = Some(vec![0.1, 0.2, 0.3]);
    original.complexity = Some(2.0);
    original.signature = Some("func f()".to_string());
    store.upsert_node(&original).await.unwrap();
    let loaded = store.get_node("a.go::f").await.unwrap().unwrap();
    assert_eq!(loaded, original);
}

#[tokio::test]
async fn edge_types_coexist_between_same_endpoints() {
    let store = open_store().await;
    let calls = CodeEdge::new("funcA", "funcB", EdgeType::Calls);
    let uses = CodeEdge::new("funcA", "funcB", EdgeType::Uses);
    assert_eq!(calls.id, "funcA->funcB:calls");
    assert_eq!(uses.id, "funcA->funcB:uses");
    store.upsert_edge(&calls).await.unwrap();
    store.upsert_edge(&uses).await.unwrap();
    let all = store.get_all_edges().await.unwrap();
    assert_eq!(all.len(), 2);
    let calls_only = store.get_edges_by_type(EdgeType::Calls).await.unwrap();
    assert_eq!(calls_only.len(), 1);
}

#[tokio::test]
async fn replace_file_with_empty_lists_deletes_everything() {
    let store = open_store().await;
    let nodes = vec![node("f.go::a", "f.go"), node("f.go::b", "f.go")];
    let edges = vec![
        CodeEdge::new("f.go::a", "f.go::b", EdgeType::Calls),
        CodeEdge::new("other.go::x", "f.go::a", EdgeType::Calls),
    ];
    store
        .update_file_atomic("f.go", &nodes, &edges[..1])
        .await
        .unwrap();
    store.upsert_edge(&edges[1]).await.unwrap();
    store
        .upsert_file_metadata(&FileMetadata {
            file_path: "f.go".to_string(),
            content_hash: "00".to_string(),
            mod_time: 1,
            indexed_at: chrono::Utc::now(),
            node_count: 2,
            edge_count: 1,
            file_size: 10,
            language: "go".to_string(),
        })
        .await
        .unwrap();

    store.update_file_atomic("f.go", &[], &[]).await.unwrap();

    assert!(store.get_nodes_by_file("f.go").await.unwrap().is_empty());
    // Incoming edge from another file is gone with the node it pointed at.
    let remaining = store.get_all_edges().await.unwrap();
    assert!(remaining.is_empty(), "orphan edges: {remaining:?}");
    assert!(store.get_file_metadata("f.go").await.unwrap().is_none());
}

#[tokio::test]
async fn replace_file_preserves_other_files() {
    let store = open_store().await;
    store
        .update_file_atomic("a.go", &[node("a.go::f", "a.go")], &[])
        .await
        .unwrap();
    store
        .update_file_atomic("b.go", &[node("b.go::g", "b.go")], &[])
        .await
        .unwrap();
    store.update_file_atomic("a.go", &[], &[]).await.unwrap();
    assert!(store.get_node("a.go::f").await.unwrap().is_none());
    assert!(store.get_node("b.go::g").await.unwrap().is_some());
}

#[tokio::test]
async fn concurrent_updates_to_same_path_serialize() {
    let store = Arc::new(open_store().await);
    let mut handles = Vec::new();
    for round in 0..8u32 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let a = node(&format!("x.go::f{round}"), "x.go");
            let b = node(&format!("x.go::g{round}"), "x.go");
            let edge = CodeEdge::new(a.id.clone(), b.id.clone(), EdgeType::Calls);
            store
                .update_file_atomic("x.go", &[a, b], &[edge])
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    // Exactly one round's rows survive, and its edge endpoints both exist.
    let nodes = store.get_nodes_by_file("x.go").await.unwrap();
    assert_eq!(nodes.len(), 2);
    let edges = store.get_all_edges().await.unwrap();
    assert_eq!(edges.len(), 1);
    let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    assert!(ids.contains(&edges[0].from_id.as_str()));
    assert!(ids.contains(&edges[0].to_id.as_str()));
}

#[tokio::test]
async fn semantic_search_filters_dimension_and_sign() {
    let store = open_store().await;
    let cancel = CancellationToken::new();
    store
        .upsert_node(&node_with_embedding("a.go::close", "a.go", vec![1.0, 0.0, 0.0]))
        .await
        .unwrap();
    store
        .upsert_node(&node_with_embedding("a.go::far", "a.go", vec![-1.0, 0.0, 0.0]))
        .await
        .unwrap();
    store
        .upsert_node(&node_with_embedding("a.go::wrong_dim", "a.go", vec![1.0, 0.0]))
        .await
        .unwrap();
    store
        .upsert_node(&node_with_embedding("a.go::zero", "a.go", vec![0.0, 0.0, 0.0]))
        .await
        .unwrap();
    store.upsert_node(&node("a.go::none", "a.go")).await.unwrap();

    let hits = store
        .semantic_search(&cancel, &[1.0, 0.0, 0.0], 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].node.id, "a.go::close");
    assert!(hits[0].score > 0.99);
}

#[tokio::test]
async fn semantic_search_clamps_limit() {
    let store = open_store().await;
    let cancel = CancellationToken::new();
    for i in 0..20 {
        store
            .upsert_node(&node_with_embedding(
                &format!("a.go::f{i}"),
                "a.go",
                vec![1.0, 0.1 * i as f32],
            ))
            .await
            .unwrap();
    }
    let default = store.semantic_search(&cancel, &[1.0, 1.0], 0).await.unwrap();
    assert_eq!(default.len(), 10);
    let capped = store.semantic_search(&cancel, &[1.0, 1.0], 5).await.unwrap();
    assert_eq!(capped.len(), 5);
}

#[tokio::test]
async fn transitive_dependencies_bfs_with_cycle() {
    let store = open_store().await;
    let cancel = CancellationToken::new();
    for id in ["m.go::a", "m.go::b", "m.go::c", "m.go::d"] {
        store.upsert_node(&node(id, "m.go")).await.unwrap();
    }
    for (from, to) in [
        ("m.go::a", "m.go::b"),
        ("m.go::b", "m.go::c"),
        ("m.go::c", "m.go::a"), // cycle back to the root
        ("m.go::c", "m.go::d"),
    ] {
        store
            .upsert_edge(&CodeEdge::new(from, to, EdgeType::Calls))
            .await
            .unwrap();
    }
    let deps = store
        .get_transitive_dependencies(&cancel, "m.go::a", 0)
        .await
        .unwrap();
    let ids: Vec<&str> = deps.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(deps.len(), 3, "root must be excluded: {ids:?}");
    assert!(ids.contains(&"m.go::b"));
    assert!(ids.contains(&"m.go::c"));
    assert!(ids.contains(&"m.go::d"));

    let shallow = store
        .get_transitive_dependencies(&cancel, "m.go::a", 1)
        .await
        .unwrap();
    assert_eq!(shallow.len(), 1);
}

#[tokio::test]
async fn trace_call_chain_finds_path_by_name() {
    let store = open_store().await;
    let cancel = CancellationToken::new();
    for id in ["m.go::entry", "m.go::middle", "m.go::leaf"] {
        store.upsert_node(&node(id, "m.go")).await.unwrap();
    }
    store
        .upsert_edge(&CodeEdge::new("m.go::entry", "m.go::middle", EdgeType::Calls))
        .await
        .unwrap();
    store
        .upsert_edge(&CodeEdge::new("m.go::middle", "m.go::leaf", EdgeType::Calls))
        .await
        .unwrap();
    // A non-calls edge must not contribute to the chain.
    store
        .upsert_edge(&CodeEdge::new("m.go::entry", "m.go::leaf", EdgeType::Uses))
        .await
        .unwrap();

    let chain = store
        .trace_call_chain(&cancel, "entry", "leaf")
        .await
        .unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].from_id, "m.go::entry");
    assert_eq!(chain[1].to_id, "m.go::leaf");

    // Substring endpoint resolution.
    let chain = store.trace_call_chain(&cancel, "entr", "lea").await.unwrap();
    assert_eq!(chain.len(), 2);

    let none = store.trace_call_chain(&cancel, "leaf", "entry").await.unwrap();
    assert!(none.is_empty());

    let missing = store.trace_call_chain(&cancel, "nope", "leaf").await.unwrap();
    assert!(missing.is_empty());
}

#[tokio::test]
async fn callers_and_callees_hydrate_endpoints() {
    let store = open_store().await;
    for id in ["m.go::a", "m.go::b", "m.go::c"] {
        store.upsert_node(&node(id, "m.go")).await.unwrap();
    }
    store
        .upsert_edge(&CodeEdge::new("m.go::a", "m.go::b", EdgeType::Calls))
        .await
        .unwrap();
    store
        .upsert_edge(&CodeEdge::new("m.go::c", "m.go::b", EdgeType::Calls))
        .await
        .unwrap();
    let callers = store.get_callers("m.go::b").await.unwrap();
    assert_eq!(callers.len(), 2);
    let callees = store.get_callees("m.go::a").await.unwrap();
    assert_eq!(callees.len(), 1);
    assert_eq!(callees[0].id, "m.go::b");
}

#[tokio::test]
async fn find_by_name_matches_substring() {
    let store = open_store().await;
    store.upsert_node(&node("a.go::handle_request", "a.go")).await.unwrap();
    store.upsert_node(&node("a.go::request_id", "a.go")).await.unwrap();
    store.upsert_node(&node("a.go::other", "a.go")).await.unwrap();
    let hits = store.find_by_name("request").await.unwrap();
    assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn cancellation_is_observed_before_work() {
    let store = open_store().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = store.semantic_search(&cancel, &[1.0], 10).await.unwrap_err();
    assert!(matches!(err, StoreError::Cancelled));
    let err = store
        .get_transitive_dependencies(&cancel, "x", 3)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Cancelled));
    let err = store.trace_call_chain(&cancel, "a", "b").await.unwrap_err();
    assert!(matches!(err, StoreError::Cancelled));
    let err = store
        .upsert_nodes_batch(&cancel, &[node("a.go::f", "a.go")])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Cancelled));
}

#[tokio::test]
async fn batch_upserts_store_all_rows() {
    let store = open_store().await;
    let cancel = CancellationToken::new();
    let nodes: Vec<CodeNode> = (0..300)
        .map(|i| node(&format!("big.go::f{i}"), "big.go"))
        .collect();
    store.upsert_nodes_batch(&cancel, &nodes).await.unwrap();
    assert_eq!(store.node_count().await.unwrap(), 300);

    let edges: Vec<CodeEdge> = (0..299)
        .map(|i| {
            CodeEdge::new(
                format!("big.go::f{i}"),
                format!("big.go::f{}", i + 1),
                EdgeType::Calls,
            )
        })
        .collect();
    store.upsert_edges_batch(&cancel, &edges).await.unwrap();
    assert_eq!(store.edge_count().await.unwrap(), 299);
}

#[tokio::test]
async fn file_metadata_round_trip_and_delete() {
    let store = open_store().await;
    let meta = FileMetadata {
        file_path: "src/app.py".to_string(),
        content_hash: "ab".repeat(32),
        mod_time: 1_700_000_000,
        indexed_at: chrono::Utc::now(),
        node_count: 4,
        edge_count: 2,
        file_size: 1024,
        language: "python".to_string(),
    };
    store.upsert_file_metadata(&meta).await.unwrap();
    let loaded = store.get_file_metadata("src/app.py").await.unwrap().unwrap();
    assert_eq!(loaded.content_hash, meta.content_hash);
    assert_eq!(loaded.mod_time, meta.mod_time);
    assert_eq!(store.get_all_file_metadata().await.unwrap().len(), 1);
    store.delete_file_metadata("src/app.py").await.unwrap();
    assert!(store.get_file_metadata("src/app.py").await.unwrap().is_none());
}

#[tokio::test]
async fn file_locks_drop_to_zero_entries() {
    let locks = FileLockMap::new();
    {
        let _a = locks.lock("one.go").await;
        assert_eq!(locks.entry_count(), 1);
    }
    assert_eq!(locks.entry_count(), 0);

    let lock_a = locks.lock("two.go").await;
    let locks_clone = locks.clone();
    let waiter = tokio::spawn(async move {
        let _b = locks_clone.lock("two.go").await;
    });
    tokio::task::yield_now().await;
    drop(lock_a);
    waiter.await.unwrap();
    assert_eq!(locks.entry_count(), 0);
}

#[tokio::test]
async fn dangling_edges_are_stored_as_is() {
    let store = open_store().await;
    let edge = CodeEdge::new("a.go::f", "external::fmt.Println", EdgeType::Calls);
    store
        .update_file_atomic("a.go", &[node("a.go::f", "a.go")], &[edge])
        .await
        .unwrap();
    let edges = store.get_all_edges().await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].to_id, "external::fmt.Println");
}
