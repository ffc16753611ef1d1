//! Offline deterministic embedder
//!
//! Maps text to a normalized byte-histogram vector. Useful for tests and
//! for running without an API key; nearby texts get nearby vectors, which
//! is enough to exercise similarity search end to end.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{EmbedError, Embedder};

pub const LOCAL_DIMENSION: usize = 64;

pub struct LocalEmbedder {
    dimension: usize,
}

impl LocalEmbedder {
    pub fn new() -> Self {
        LocalEmbedder {
            dimension: LOCAL_DIMENSION,
        }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        LocalEmbedder { dimension }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for (i, byte) in text.bytes().enumerate() {
            let bucket = (byte as usize).wrapping_add(i / 7) % self.dimension;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for LocalEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed_single(
        &self,
        cancel: &CancellationToken,
        text: &str,
    ) -> Result<Vec<f32>, EmbedError> {
        if cancel.is_cancelled() {
            return Err(EmbedError::Cancelled);
        }
        Ok(self.vectorize(text))
    }

    async fn embed(
        &self,
        cancel: &CancellationToken,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        if cancel.is_cancelled() {
            return Err(EmbedError::Cancelled);
        }
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn name(&self) -> &str {
        "local"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
