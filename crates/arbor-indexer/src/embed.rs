//! Embedding phase: bounded retry with backoff and a fixed worker pool

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::bail;
use arbor_core::CodeNode;
use arbor_embed::{EmbedError, Embedder};
use tokio_util::sync::CancellationToken;

use crate::config::IndexerConfig;

/// Embedding counters, updated atomically across workers.
#[derive(Default)]
pub struct EmbedMetrics {
    pub success: AtomicU64,
    pub retry: AtomicU64,
    pub failure: AtomicU64,
}

impl EmbedMetrics {
    pub fn success_count(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
    }
    pub fn retry_count(&self) -> u64 {
        self.retry.load(Ordering::Relaxed)
    }
    pub fn failure_count(&self) -> u64 {
        self.failure.load(Ordering::Relaxed)
    }
}

/// Run `op` up to `max_attempts` times with exponential backoff starting at
/// `base_delay`. Returns `Ok(None)` when every attempt failed; the caller
/// stores the node without an embedding. Cancellation aborts with an error,
/// even when it arrives during a backoff sleep.
async fn with_retry<T, Fut>(
    cancel: &CancellationToken,
    max_attempts: u32,
    base_delay: Duration,
    metrics: &EmbedMetrics,
    unit_count: u64,
    mut op: impl FnMut() -> Fut,
) -> anyhow::Result<Option<T>>
where
    Fut: Future<Output = Result<T, EmbedError>>,
{
    let mut delay = base_delay;
    for attempt in 1..=max_attempts {
        if cancel.is_cancelled() {
            bail!("embedding cancelled");
        }
        match op().await {
            Ok(value) => {
                metrics.success.fetch_add(unit_count, Ordering::Relaxed);
                return Ok(Some(value));
            }
            Err(EmbedError::Cancelled) => bail!("embedding cancelled"),
            Err(e) => {
                if attempt == max_attempts {
                    metrics.failure.fetch_add(unit_count, Ordering::Relaxed);
                    tracing::warn!("embedding failed after {} attempts: {}", attempt, e);
                    return Ok(None);
                }
                metrics.retry.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("embedding attempt {} failed, retrying in {:?}: {}", attempt, delay, e);
                tokio::select! {
                    _ = cancel.cancelled() => bail!("embedding cancelled"),
                    _ = tokio::time::sleep(delay) => {}
                }
                delay *= 2;
            }
        }
    }
    Ok(None)
}

/// Fill in embeddings for every node with non-empty content. Small sets go
/// through the single-text endpoint; larger ones are split into batches and
/// spread over a fixed worker pool, with results reassembled in input
/// order. Nodes whose embedding ultimately fails keep `embedding = None`.
pub async fn embed_nodes(
    embedder: &Arc<dyn Embedder>,
    config: &IndexerConfig,
    metrics: &Arc<EmbedMetrics>,
    cancel: &CancellationToken,
    nodes: &mut [CodeNode],
) -> anyhow::Result<()> {
    let targets: Vec<usize> = nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| !n.content.is_empty())
        .map(|(i, _)| i)
        .collect();
    if targets.is_empty() {
        return Ok(());
    }

    if targets.len() <= config.batch_size {
        for &index in &targets {
            let text = nodes[index].content.clone();
            let embedded = with_retry(
                cancel,
                config.max_attempts,
                config.retry_base_delay,
                metrics,
                1,
                || embedder.embed_single(cancel, &text),
            )
            .await?;
            nodes[index].embedding = embedded;
        }
        return Ok(());
    }

    // Batch path: chunks of at most batch_size, round-robin over workers.
    let batches: Vec<(usize, Vec<usize>, Vec<String>)> = targets
        .chunks(config.batch_size)
        .enumerate()
        .map(|(batch_index, chunk)| {
            let texts = chunk.iter().map(|&i| nodes[i].content.clone()).collect();
            (batch_index, chunk.to_vec(), texts)
        })
        .collect();

    let workers = config.workers.max(1);
    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let assigned: Vec<(usize, Vec<String>)> = batches
            .iter()
            .skip(worker)
            .step_by(workers)
            .map(|(index, _, texts)| (*index, texts.clone()))
            .collect();
        if assigned.is_empty() {
            continue;
        }
        let embedder = Arc::clone(embedder);
        let metrics = Arc::clone(metrics);
        let cancel = cancel.clone();
        let max_attempts = config.max_attempts;
        let base_delay = config.retry_base_delay;
        handles.push(tokio::spawn(async move {
            let mut results: Vec<(usize, Option<Vec<Vec<f32>>>)> = Vec::new();
            for (batch_index, texts) in assigned {
                if cancel.is_cancelled() {
                    bail!("embedding cancelled");
                }
                let unit_count = texts.len() as u64;
                let vectors = with_retry(
                    &cancel,
                    max_attempts,
                    base_delay,
                    &metrics,
                    unit_count,
                    || embedder.embed(&cancel, &texts),
                )
                .await?;
                results.push((batch_index, vectors));
            }
            Ok(results)
        }));
    }

    let mut by_batch: Vec<Option<Vec<Vec<f32>>>> = vec![None; batches.len()];
    for handle in handles {
        let results = handle.await??;
        for (batch_index, vectors) in results {
            by_batch[batch_index] = vectors;
        }
    }
    for (batch_index, indices, _) in &batches {
        if let Some(vectors) = by_batch[*batch_index].take() {
            for (&node_index, vector) in indices.iter().zip(vectors) {
                nodes[node_index].embedding = Some(vector);
            }
        }
    }
    Ok(())
}
