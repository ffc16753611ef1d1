//! CLI command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arbor_embed::{Embedder, LocalEmbedder, OpenAiEmbedder};
use arbor_indexer::{Indexer, IndexerConfig};
use arbor_store::GraphStore;
use arbor_watcher::WatchService;
use tokio_util::sync::CancellationToken;

use crate::config::{ArborConfig, DATA_DIR};

async fn open_store(root: &Path, config: &ArborConfig) -> anyhow::Result<Arc<GraphStore>> {
    let db_path = config.db_path(root);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Arc::new(GraphStore::open(&db_path)?);
    store.run_migrations().await?;
    Ok(store)
}

fn build_embedder(config: &ArborConfig) -> Arc<dyn Embedder> {
    let provider = config.embedding.provider.as_deref();
    match (provider, config.api_key()) {
        (Some("local"), _) | (None, None) => {
            tracing::info!("embedding provider: local");
            Arc::new(LocalEmbedder::new())
        }
        (_, Some(api_key)) => {
            let api_base = config
                .embedding
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".to_string());
            let mut embedder = OpenAiEmbedder::new(api_base, api_key);
            if let (Some(model), Some(dimension)) =
                (config.embedding.model.clone(), config.embedding.dimension)
            {
                embedder = embedder.with_model(model, dimension);
            }
            tracing::info!("embedding provider: openai-compatible");
            Arc::new(embedder)
        }
        (Some(other), None) => {
            tracing::warn!("provider {other:?} configured but no API key found, using local");
            Arc::new(LocalEmbedder::new())
        }
    }
}

async fn build_indexer(root: &Path) -> anyhow::Result<Arc<Indexer>> {
    let config = ArborConfig::load(root)?;
    let store = open_store(root, &config).await?;
    let embedder = build_embedder(&config);
    let mut indexer_config = IndexerConfig::new(root);
    indexer_config.exclude = config.exclude.clone();
    if let Some(workers) = config.workers {
        indexer_config.workers = workers;
    }
    if let Some(batch_size) = config.batch_size {
        indexer_config.batch_size = batch_size;
    }
    Ok(Arc::new(Indexer::new(store, embedder, indexer_config)))
}

pub async fn index(root: PathBuf) -> anyhow::Result<()> {
    let indexer = build_indexer(&root).await?;
    let cancel = cancel_on_ctrl_c();
    let summary = indexer.run(&cancel).await?;
    tracing::info!(
        "indexed {} files ({} skipped, {} deleted, {} failed): {} nodes, {} edges in {} ms",
        summary.files_indexed,
        summary.files_skipped,
        summary.files_deleted,
        summary.files_failed,
        summary.node_count,
        summary.edge_count,
        summary.elapsed_ms
    );
    Ok(())
}

pub async fn watch(root: PathBuf, debounce_ms: u64) -> anyhow::Result<()> {
    let indexer = build_indexer(&root).await?;
    let cancel = cancel_on_ctrl_c();

    let summary = indexer.run(&cancel).await?;
    tracing::info!(
        "initial index: {} files, {} nodes, {} edges",
        summary.files_indexed,
        summary.node_count,
        summary.edge_count
    );

    let service = WatchService::new(Arc::clone(&indexer)).with_debounce_ms(debounce_ms);
    service.run(&cancel).await
}

pub async fn search(root: PathBuf, query: String, limit: usize) -> anyhow::Result<()> {
    let config = ArborConfig::load(&root)?;
    let store = open_store(&root, &config).await?;
    let embedder = build_embedder(&config);
    let cancel = CancellationToken::new();

    let query_vec = embedder.embed_single(&cancel, &query).await?;
    let hits = store.semantic_search(&cancel, &query_vec, limit).await?;
    if hits.is_empty() {
        println!("no matches");
        return Ok(());
    }
    for hit in hits {
        println!(
            "{:.3}  {}  {}:{}  [{}]",
            hit.score, hit.node.id, hit.node.file_path, hit.node.start_line, hit.node.node_type
        );
    }
    Ok(())
}

pub async fn trace(root: PathBuf, from: String, to: String) -> anyhow::Result<()> {
    let config = ArborConfig::load(&root)?;
    let store = open_store(&root, &config).await?;
    let cancel = CancellationToken::new();
    let chain = store.trace_call_chain(&cancel, &from, &to).await?;
    if chain.is_empty() {
        println!("no call chain from {from:?} to {to:?}");
        return Ok(());
    }
    for edge in &chain {
        println!("{} -> {}", edge.from_id, edge.to_id);
    }
    Ok(())
}

pub async fn lookup(root: PathBuf, name: String) -> anyhow::Result<()> {
    let config = ArborConfig::load(&root)?;
    let store = open_store(&root, &config).await?;
    let nodes = store.find_by_name(&name).await?;
    if nodes.is_empty() {
        println!("no nodes matching {name:?}");
        return Ok(());
    }
    for node in nodes {
        println!(
            "{}  {}:{}  [{}]",
            node.id, node.file_path, node.start_line, node.node_type
        );
    }
    Ok(())
}

pub async fn file(root: PathBuf, path: String) -> anyhow::Result<()> {
    let config = ArborConfig::load(&root)?;
    let store = open_store(&root, &config).await?;
    let nodes = store.get_nodes_by_file(&path).await?;
    if nodes.is_empty() {
        println!("no nodes indexed for {path:?}");
        return Ok(());
    }
    for node in nodes {
        println!(
            "{:5}  {}  [{}]",
            node.start_line, node.name, node.node_type
        );
    }
    Ok(())
}

pub async fn callers(root: PathBuf, node: String) -> anyhow::Result<()> {
    let config = ArborConfig::load(&root)?;
    let store = open_store(&root, &config).await?;
    for caller in store.get_callers(&node).await? {
        println!("{}  {}:{}", caller.id, caller.file_path, caller.start_line);
    }
    Ok(())
}

pub async fn callees(root: PathBuf, node: String) -> anyhow::Result<()> {
    let config = ArborConfig::load(&root)?;
    let store = open_store(&root, &config).await?;
    for callee in store.get_callees(&node).await? {
        println!("{}  {}:{}", callee.id, callee.file_path, callee.start_line);
    }
    Ok(())
}

pub async fn deps(root: PathBuf, node: String, depth: i32) -> anyhow::Result<()> {
    let config = ArborConfig::load(&root)?;
    let store = open_store(&root, &config).await?;
    let cancel = CancellationToken::new();
    let nodes = store
        .get_transitive_dependencies(&cancel, &node, depth)
        .await?;
    if nodes.is_empty() {
        println!("no dependencies found for {node:?}");
        return Ok(());
    }
    for node in nodes {
        println!("{}  [{}]", node.id, node.node_type);
    }
    Ok(())
}

pub async fn status(root: PathBuf) -> anyhow::Result<()> {
    let config = ArborConfig::load(&root)?;
    let store = open_store(&root, &config).await?;
    let files = store.get_all_file_metadata().await?;
    let stats = serde_json::json!({
        "files": files.len(),
        "nodes": store.node_count().await?,
        "edges": store.edge_count().await?,
        "last_indexed": files.iter().map(|f| f.indexed_at).max(),
    });
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

pub fn clear(root: PathBuf) -> anyhow::Result<()> {
    let data_dir = root.join(DATA_DIR);
    if data_dir.exists() {
        std::fs::remove_dir_all(&data_dir)?;
        tracing::info!("removed {}", data_dir.display());
    } else {
        tracing::info!("nothing to clear");
    }
    Ok(())
}

/// A token cancelled by the first ctrl-c.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            handle.cancel();
        }
    });
    cancel
}
