//! Unit tests for the indexing pipeline

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use arbor_core::NodeType;
use arbor_embed::providers::local::LocalEmbedder;
use arbor_embed::{EmbedError, Embedder};
use arbor_store::GraphStore;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::IndexerConfig;
use crate::embed::{EmbedMetrics, embed_nodes};
use crate::hash::{compute_file_hash, hash_bytes};
use crate::pipeline::Indexer;

async fn indexer_for(root: &std::path::Path) -> Indexer {
    let store = Arc::new(GraphStore::open_in_memory().unwrap());
    store.run_migrations().await.unwrap();
    let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new());
    Indexer::new(store, embedder, IndexerConfig::new(root))
}

fn write(root: &std::path::Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn hash_bytes_matches_sha256() {
    assert_eq!(
        hash_bytes(b"abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn file_hash_honors_cancellation() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "big.go", &"x".repeat(100_000));
    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(compute_file_hash(&cancel, &path).is_err());

    let fresh = CancellationToken::new();
    let hash = compute_file_hash(&fresh, &path).unwrap();
    assert_eq!(hash.len(), 64);
}

#[tokio::test(flavor = "multi_thread")]
async fn full_run_indexes_supported_files() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "src/main.go",
        "package main\n\nfunc main() {\n\thelper()\n}\n\nfunc helper() {}\n",
    );
    write(dir.path(), "src/util.py", "def util():\n    return 1\n");
    write(dir.path(), "README.md", "not code");

    let indexer = indexer_for(dir.path()).await;
    let cancel = CancellationToken::new();
    let summary = indexer.run(&cancel).await.unwrap();

    assert_eq!(summary.files_scanned, 2);
    assert_eq!(summary.files_indexed, 2);
    assert_eq!(summary.files_deleted, 0);

    let store = indexer.store();
    let go_nodes = store.get_nodes_by_file("src/main.go").await.unwrap();
    assert!(go_nodes.iter().any(|n| n.name == "main"));
    assert!(go_nodes.iter().any(|n| n.name == "helper"));
    // Non-empty nodes got embeddings from the local provider.
    assert!(go_nodes.iter().all(|n| n.embedding.is_some()));

    let meta = store.get_file_metadata("src/main.go").await.unwrap().unwrap();
    assert_eq!(meta.language, "go");
    assert_eq!(meta.node_count as usize, go_nodes.len());
    assert!(store.get_file_metadata("README.md").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn unchanged_files_are_skipped_on_reindex() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "a.py", "def f():\n    return 1\n");

    let indexer = indexer_for(dir.path()).await;
    let cancel = CancellationToken::new();
    let first = indexer.run(&cancel).await.unwrap();
    assert_eq!(first.files_indexed, 1);

    // Touch the mod time without changing content: hash equality skips it.
    let late = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
    let file_handle = std::fs::File::options().append(true).open(&file).unwrap();
    file_handle.set_modified(late).unwrap();
    drop(file_handle);

    let second = indexer.run(&cancel).await.unwrap();
    assert_eq!(second.files_indexed, 0);
    assert_eq!(second.files_skipped, 1);

    // Change content: the file is re-parsed and old rows replaced. The
    // mod time is bumped explicitly; second-granularity timestamps would
    // otherwise hide a rewrite within the same second.
    std::fs::write(&file, "def g():\n    return 2\n").unwrap();
    let handle = std::fs::File::options().append(true).open(&file).unwrap();
    handle
        .set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(10))
        .unwrap();
    drop(handle);
    let third = indexer.run(&cancel).await.unwrap();
    assert_eq!(third.files_indexed, 1);
    let nodes = indexer.store().get_nodes_by_file("a.py").await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name, "g");
}

#[tokio::test(flavor = "multi_thread")]
async fn deleted_files_are_purged() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "gone.py", "def f():\n    return 1\n");

    let indexer = indexer_for(dir.path()).await;
    let cancel = CancellationToken::new();
    indexer.run(&cancel).await.unwrap();
    assert!(!indexer.store().get_nodes_by_file("gone.py").await.unwrap().is_empty());

    std::fs::remove_file(&file).unwrap();
    let summary = indexer.run(&cancel).await.unwrap();
    assert_eq!(summary.files_deleted, 1);
    assert!(indexer.store().get_nodes_by_file("gone.py").await.unwrap().is_empty());
    assert!(indexer.store().get_file_metadata("gone.py").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn parse_failure_does_not_abort_run() {
    let dir = tempfile::tempdir().unwrap();
    // Invalid UTF-8 forces a read failure for one file.
    std::fs::write(dir.path().join("bad.go"), [0xFF, 0xFE, 0x00]).unwrap();
    write(dir.path(), "good.go", "package main\n\nfunc ok() {}\n");

    let indexer = indexer_for(dir.path()).await;
    let cancel = CancellationToken::new();
    let summary = indexer.run(&cancel).await.unwrap();
    assert_eq!(summary.files_indexed, 1);
    assert_eq!(summary.files_failed, 1);
    let status = indexer.status().await;
    assert_eq!(status.errors.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn single_file_update_and_remove() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "w.py", "def watch_me():\n    return 1\n");

    let indexer = indexer_for(dir.path()).await;
    let cancel = CancellationToken::new();
    indexer.update_file(&cancel, &file).await.unwrap();
    let nodes = indexer.store().get_nodes_by_file("w.py").await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].node_type, NodeType::Function);

    // Same content again: skipped by hash, still exactly one node.
    indexer.update_file(&cancel, &file).await.unwrap();
    assert_eq!(indexer.store().get_nodes_by_file("w.py").await.unwrap().len(), 1);

    indexer.remove_file(&cancel, &file).await.unwrap();
    assert!(indexer.store().get_nodes_by_file("w.py").await.unwrap().is_empty());
    assert!(indexer.store().get_file_metadata("w.py").await.unwrap().is_none());
}

/// Fails a fixed number of times, then succeeds.
struct FlakyEmbedder {
    failures: AtomicU32,
    calls: AtomicU32,
}

impl FlakyEmbedder {
    fn new(failures: u32) -> Self {
        FlakyEmbedder {
            failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    async fn embed_single(
        &self,
        _cancel: &CancellationToken,
        _text: &str,
    ) -> Result<Vec<f32>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| {
            if f > 0 { Some(f - 1) } else { None }
        }).is_ok()
        {
            return Err(EmbedError::Request("transient".to_string()));
        }
        Ok(vec![1.0, 0.0])
    }

    async fn embed(
        &self,
        cancel: &CancellationToken,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_single(cancel, text).await?);
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "flaky"
    }

    fn dimension(&self) -> usize {
        2
    }
}

#[tokio::test(start_paused = true)]
async fn embedding_retries_with_backoff_then_succeeds() {
    let embedder = Arc::new(FlakyEmbedder::new(2));
    let as_dyn: Arc<dyn Embedder> = embedder.clone();
    let config = IndexerConfig::default();
    let metrics = Arc::new(EmbedMetrics::default());
    let cancel = CancellationToken::new();

    let mut nodes = vec![arbor_core::CodeNode {
        content: "func greet() {}".to_string(),
        ..arbor_core::CodeNode::new("a.go::greet", "greet", NodeType::Function, "go", "a.go")
    }];

    let started = tokio::time::Instant::now();
    embed_nodes(&as_dyn, &config, &metrics, &cancel, &mut nodes)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    assert!(elapsed >= std::time::Duration::from_millis(1400), "backoff was {elapsed:?}");
    assert!(nodes[0].embedding.is_some());
    assert_eq!(metrics.retry_count(), 2);
    assert_eq!(metrics.success_count(), 1);
    assert_eq!(metrics.failure_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn embedding_gives_up_after_max_attempts() {
    let embedder: Arc<dyn Embedder> = Arc::new(FlakyEmbedder::new(u32::MAX));
    let config = IndexerConfig::default();
    let metrics = Arc::new(EmbedMetrics::default());
    let cancel = CancellationToken::new();

    let mut nodes = vec![arbor_core::CodeNode {
        content: "def f(): pass".to_string(),
        ..arbor_core::CodeNode::new("a.py::f", "f", NodeType::Function, "python", "a.py")
    }];
    embed_nodes(&embedder, &config, &metrics, &cancel, &mut nodes)
        .await
        .unwrap();
    assert!(nodes[0].embedding.is_none());
    assert_eq!(metrics.failure_count(), 1);
    assert_eq!(metrics.retry_count(), 2);
}

#[tokio::test]
async fn cancellation_during_backoff_aborts() {
    let embedder: Arc<dyn Embedder> = Arc::new(FlakyEmbedder::new(u32::MAX));
    let config = IndexerConfig::default();
    let metrics = Arc::new(EmbedMetrics::default());
    let cancel = CancellationToken::new();

    let mut nodes = vec![arbor_core::CodeNode {
        content: "def f(): pass".to_string(),
        ..arbor_core::CodeNode::new("a.py::f", "f", NodeType::Function, "python", "a.py")
    }];
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel_clone.cancel();
    });
    let err = embed_nodes(&embedder, &config, &metrics, &cancel, &mut nodes)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("cancelled"));
}

#[tokio::test(flavor = "multi_thread")]
async fn progress_callback_receives_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.py", "def f():\n    return 1\n");

    let store = Arc::new(GraphStore::open_in_memory().unwrap());
    store.run_migrations().await.unwrap();
    let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new());
    let states = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&states);
    let indexer = Indexer::new(store, embedder, IndexerConfig::new(dir.path())).with_progress(
        Arc::new(move |snapshot| {
            sink.lock().unwrap().push(snapshot.state);
        }),
    );

    indexer.run(&CancellationToken::new()).await.unwrap();
    let seen = states.lock().unwrap();
    assert_eq!(seen.first(), Some(&arbor_core::IndexState::Indexing));
    assert_eq!(seen.last(), Some(&arbor_core::IndexState::Idle));
}

#[tokio::test(flavor = "multi_thread")]
async fn excluded_paths_are_not_indexed() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "vendor/dep.go", "package dep\n\nfunc Dep() {}\n");
    write(dir.path(), "main.go", "package main\n\nfunc main() {}\n");

    let store = Arc::new(GraphStore::open_in_memory().unwrap());
    store.run_migrations().await.unwrap();
    let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new());
    let mut config = IndexerConfig::new(dir.path());
    config.exclude = vec!["vendor".to_string()];
    let indexer = Indexer::new(store, embedder, config);

    let summary = indexer.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.files_scanned, 1);
    assert!(indexer.store().get_nodes_by_file("vendor/dep.go").await.unwrap().is_empty());
}
