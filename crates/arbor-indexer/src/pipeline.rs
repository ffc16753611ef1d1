//! The indexing pipeline: scan, parse, embed, commit, delete

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, bail};
use arbor_core::{ExcludeMatcher, FileMetadata, IndexState, Lang};
use arbor_embed::Embedder;
use arbor_extract::ParseResult;
use arbor_store::GraphStore;
use ignore::WalkBuilder;
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::config::IndexerConfig;
use crate::embed::{EmbedMetrics, embed_nodes};
use crate::hash::{compute_file_hash, hash_bytes};
use crate::status::{ProgressCallback, StatusHandle};

/// Outcome of one full run.
#[derive(Debug, Clone, Default)]
pub struct IndexSummary {
    pub files_scanned: u64,
    pub files_indexed: u64,
    pub files_skipped: u64,
    pub files_deleted: u64,
    pub files_failed: u64,
    pub node_count: u64,
    pub edge_count: u64,
    pub elapsed_ms: u64,
}

/// A file the scan decided must be (re)parsed.
#[derive(Debug, Clone)]
struct ChangedFile {
    abs_path: PathBuf,
    rel_path: String,
    mod_time: i64,
    file_size: u64,
    content_hash: String,
    language: Lang,
}

struct ScanOutcome {
    changed: Vec<ChangedFile>,
    deleted: Vec<String>,
    scanned: u64,
    skipped: u64,
}

pub struct Indexer {
    store: Arc<GraphStore>,
    embedder: Arc<dyn Embedder>,
    config: IndexerConfig,
    status: StatusHandle,
    metrics: Arc<EmbedMetrics>,
}

impl Indexer {
    pub fn new(store: Arc<GraphStore>, embedder: Arc<dyn Embedder>, config: IndexerConfig) -> Self {
        Indexer {
            store,
            embedder,
            config,
            status: StatusHandle::new(),
            metrics: Arc::new(EmbedMetrics::default()),
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.status = self.status.with_callback(callback);
        self
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &EmbedMetrics {
        &self.metrics
    }

    /// Used by the watcher to reflect watch mode in the status record.
    pub async fn set_state(&self, state: IndexState) {
        self.status.update(|s| s.state = state).await;
    }

    pub async fn status(&self) -> arbor_core::IndexStatus {
        let mut snapshot = self.status.snapshot().await;
        snapshot.embedding_success_count = self.metrics.success_count();
        snapshot.embedding_retry_count = self.metrics.retry_count();
        snapshot.embedding_failure_count = self.metrics.failure_count();
        snapshot
    }

    /// One full incremental run over the configured root.
    ///
    /// A single file failing to read, parse or embed never aborts the run;
    /// the error lands in the status record and the walk continues.
    pub async fn run(&self, cancel: &CancellationToken) -> anyhow::Result<IndexSummary> {
        let started = Instant::now();
        self.status
            .update(|s| {
                s.state = IndexState::Indexing;
                s.started_at = Some(chrono::Utc::now());
                s.finished_at = None;
            })
            .await;

        let result = self.run_inner(cancel, started).await;
        match &result {
            Ok(_) => {
                self.status
                    .update(|s| {
                        s.state = IndexState::Idle;
                        s.finished_at = Some(chrono::Utc::now());
                    })
                    .await;
            }
            Err(e) => {
                let message = e.to_string();
                self.status
                    .update(|s| {
                        s.state = IndexState::Error;
                        s.finished_at = Some(chrono::Utc::now());
                        s.record_error(message.clone());
                    })
                    .await;
            }
        }
        result
    }

    async fn run_inner(
        &self,
        cancel: &CancellationToken,
        started: Instant,
    ) -> anyhow::Result<IndexSummary> {
        let known: HashMap<String, FileMetadata> = self
            .store
            .get_all_file_metadata()
            .await?
            .into_iter()
            .map(|m| (m.file_path.clone(), m))
            .collect();

        // Scan and hash on a blocking thread; both are file-IO bound.
        let scan = {
            let config = self.config.clone();
            let cancel = cancel.clone();
            let known = known.clone();
            tokio::task::spawn_blocking(move || scan_changes(&cancel, &config, &known)).await??
        };
        self.status
            .update(|s| {
                s.files_scanned = scan.scanned;
                s.files_skipped = scan.skipped;
            })
            .await;
        tracing::info!(
            "scan: {} files, {} changed, {} deleted, {} unchanged",
            scan.scanned,
            scan.changed.len(),
            scan.deleted.len(),
            scan.skipped
        );

        // Parse phase: each changed file independently, in parallel.
        let parsed = {
            let cancel = cancel.clone();
            let changed = scan.changed.clone();
            tokio::task::spawn_blocking(move || parse_changed(&cancel, changed)).await?
        };
        if cancel.is_cancelled() {
            bail!("index run cancelled");
        }

        let mut summary = IndexSummary {
            files_scanned: scan.scanned,
            files_skipped: scan.skipped,
            ..Default::default()
        };

        // Embed and commit per file.
        for (file, parse) in parsed {
            if cancel.is_cancelled() {
                bail!("index run cancelled");
            }
            let mut parse = match parse {
                Ok(parse) => parse,
                Err(message) => {
                    tracing::warn!("parse failed for {}: {}", file.rel_path, message);
                    summary.files_failed += 1;
                    self.status.update(|s| s.record_error(message)).await;
                    continue;
                }
            };
            embed_nodes(
                &self.embedder,
                &self.config,
                &self.metrics,
                cancel,
                &mut parse.nodes,
            )
            .await?;
            match self.commit_file(&file, &parse).await {
                Ok(()) => {
                    summary.files_indexed += 1;
                    summary.node_count += parse.nodes.len() as u64;
                    summary.edge_count += parse.edges.len() as u64;
                    let nodes = parse.nodes.len() as u64;
                    let edges = parse.edges.len() as u64;
                    self.status
                        .update(|s| {
                            s.files_indexed += 1;
                            s.node_count += nodes;
                            s.edge_count += edges;
                        })
                        .await;
                }
                Err(e) => {
                    let message = format!("commit failed for {}: {e}", file.rel_path);
                    tracing::warn!("{message}");
                    summary.files_failed += 1;
                    self.status.update(|s| s.record_error(message)).await;
                }
            }
        }

        // Deletion phase: files in metadata but gone from disk.
        for rel_path in &scan.deleted {
            if cancel.is_cancelled() {
                bail!("index run cancelled");
            }
            self.store.update_file_atomic(rel_path, &[], &[]).await?;
            self.store.delete_file_metadata(rel_path).await?;
            summary.files_deleted += 1;
            self.status.update(|s| s.files_deleted += 1).await;
        }

        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        Ok(summary)
    }

    async fn commit_file(&self, file: &ChangedFile, parse: &ParseResult) -> anyhow::Result<()> {
        self.store
            .update_file_atomic(&file.rel_path, &parse.nodes, &parse.edges)
            .await?;
        // Metadata is written only after the transaction commits, so a
        // failed update cannot leave metadata ahead of graph contents.
        self.store
            .upsert_file_metadata(&FileMetadata {
                file_path: file.rel_path.clone(),
                content_hash: file.content_hash.clone(),
                mod_time: file.mod_time,
                indexed_at: chrono::Utc::now(),
                node_count: parse.nodes.len() as u32,
                edge_count: parse.edges.len() as u32,
                file_size: file.file_size,
                language: file.language.as_str().to_string(),
            })
            .await?;
        Ok(())
    }

    /// Watcher entry point: re-index a single file through the same atomic
    /// path. Unchanged content (by hash) is skipped.
    pub async fn update_file(&self, cancel: &CancellationToken, path: &Path) -> anyhow::Result<()> {
        if cancel.is_cancelled() {
            bail!("update cancelled");
        }
        let Some(language) = Lang::from_path(path) else {
            return Ok(());
        };
        let matcher = ExcludeMatcher::new(&self.config.exclude);
        if matcher.is_excluded(path) {
            return Ok(());
        }
        let rel_path = self.relative(path);
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            // The file vanished between the event and now.
            Err(_) => return self.remove_file(cancel, path).await,
        };
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        let content_hash = hash_bytes(source.as_bytes());
        if let Some(known) = self.store.get_file_metadata(&rel_path).await? {
            if known.content_hash == content_hash {
                tracing::debug!("unchanged, skipping: {rel_path}");
                return Ok(());
            }
        }

        let mut parse = match arbor_extract::parse_source(&rel_path, &source) {
            Ok(parse) => parse,
            Err(e) => {
                let message = format!("parse failed for {rel_path}: {e}");
                tracing::warn!("{message}");
                self.status.update(|s| s.record_error(message)).await;
                return Ok(());
            }
        };
        embed_nodes(
            &self.embedder,
            &self.config,
            &self.metrics,
            cancel,
            &mut parse.nodes,
        )
        .await?;
        let file = ChangedFile {
            abs_path: path.to_path_buf(),
            rel_path,
            mod_time: mod_time_secs(&metadata),
            file_size: metadata.len(),
            content_hash,
            language,
        };
        self.commit_file(&file, &parse).await?;
        let nodes = parse.nodes.len() as u64;
        let edges = parse.edges.len() as u64;
        self.status
            .update(|s| {
                s.files_indexed += 1;
                s.node_count += nodes;
                s.edge_count += edges;
            })
            .await;
        Ok(())
    }

    /// Watcher deletion path: drop the file's rows and metadata.
    pub async fn remove_file(&self, cancel: &CancellationToken, path: &Path) -> anyhow::Result<()> {
        if cancel.is_cancelled() {
            bail!("remove cancelled");
        }
        if Lang::from_path(path).is_none() {
            return Ok(());
        }
        let rel_path = self.relative(path);
        self.store.update_file_atomic(&rel_path, &[], &[]).await?;
        self.store.delete_file_metadata(&rel_path).await?;
        self.status.update(|s| s.files_deleted += 1).await;
        tracing::info!("removed from index: {rel_path}");
        Ok(())
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.config.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

/// Walk the root, decide per file whether it changed. A file is changed if
/// it is new, or its mod-time differs and its hash differs, or either read
/// fails; mod-time-only touches are skipped via hash equality.
fn scan_changes(
    cancel: &CancellationToken,
    config: &IndexerConfig,
    known: &HashMap<String, FileMetadata>,
) -> anyhow::Result<ScanOutcome> {
    let matcher = ExcludeMatcher::new(&config.exclude);
    let mut changed = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    let mut scanned = 0u64;
    let mut skipped = 0u64;

    for entry in WalkBuilder::new(&config.root).build() {
        if cancel.is_cancelled() {
            bail!("scan cancelled");
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("walk error: {e}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        let Some(language) = Lang::from_path(path) else {
            continue;
        };
        let rel = path
            .strip_prefix(&config.root)
            .unwrap_or(path)
            .to_path_buf();
        if matcher.is_excluded(&rel) {
            continue;
        }
        let rel_path = rel.to_string_lossy().replace('\\', "/");
        scanned += 1;
        seen.push(rel_path.clone());

        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("stat failed for {}: {e}", path.display());
                continue;
            }
        };
        let mod_time = mod_time_secs(&metadata);

        let needs_hash = match known.get(&rel_path) {
            None => true,
            Some(existing) if existing.mod_time == mod_time => {
                skipped += 1;
                false
            }
            Some(_) => true,
        };
        if !needs_hash {
            continue;
        }
        let content_hash = match compute_file_hash(cancel, path) {
            Ok(hash) => hash,
            Err(e) => {
                if cancel.is_cancelled() {
                    return Err(e);
                }
                tracing::warn!("hash failed for {}: {e}", path.display());
                continue;
            }
        };
        if let Some(existing) = known.get(&rel_path) {
            if existing.content_hash == content_hash {
                // Touched but identical.
                skipped += 1;
                continue;
            }
        }
        changed.push(ChangedFile {
            abs_path: path.to_path_buf(),
            rel_path,
            mod_time,
            file_size: metadata.len(),
            content_hash,
            language,
        });
    }

    let seen: std::collections::HashSet<&str> = seen.iter().map(String::as_str).collect();
    let deleted: Vec<String> = known
        .keys()
        .filter(|path| !seen.contains(path.as_str()))
        .cloned()
        .collect();

    Ok(ScanOutcome {
        changed,
        deleted,
        scanned,
        skipped,
    })
}

/// Parse all changed files in parallel. Individual failures are returned as
/// messages, never as a phase failure.
fn parse_changed(
    cancel: &CancellationToken,
    changed: Vec<ChangedFile>,
) -> Vec<(ChangedFile, Result<ParseResult, String>)> {
    changed
        .into_par_iter()
        .map(|file| {
            if cancel.is_cancelled() {
                return (file, Err("parse cancelled".to_string()));
            }
            let source = match std::fs::read_to_string(&file.abs_path) {
                Ok(source) => source,
                Err(e) => {
                    let message = format!("read failed for {}: {e}", file.rel_path);
                    return (file, Err(message));
                }
            };
            let result = arbor_extract::parse_source_as(file.language, &file.rel_path, &source)
                .map_err(|e| e.to_string());
            (file, result)
        })
        .collect()
}

fn mod_time_secs(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
