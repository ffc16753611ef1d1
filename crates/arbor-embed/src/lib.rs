//! Arbor Embed — embedding provider interface and implementations

pub mod providers;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use providers::local::LocalEmbedder;
pub use providers::openai::OpenAiEmbedder;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Request(String),
    #[error("provider returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },
    #[error("operation cancelled")]
    Cancelled,
}

/// Embedding provider seam. Vectors are `f32` of length `dimension()`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text.
    async fn embed_single(
        &self,
        cancel: &CancellationToken,
        text: &str,
    ) -> Result<Vec<f32>, EmbedError>;

    /// Embed a batch of texts, preserving input order.
    async fn embed(
        &self,
        cancel: &CancellationToken,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbedError>;

    fn name(&self) -> &str;

    fn dimension(&self) -> usize;
}
