//! OpenAI-compatible embeddings provider

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{EmbedError, Embedder};

/// HTTP client for any service speaking the `/v1/embeddings` protocol.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        OpenAiEmbedder {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.model = model.into();
        self.dimension = dimension;
        self
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        tracing::debug!("embedding {} texts with {}", texts.len(), self.model);
        let body = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };
        let url = format!("{}/v1/embeddings", self.api_base.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbedError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(EmbedError::Request(format!("{status}: {text}")));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Request(e.to_string()))?;
        vectors_in_input_order(parsed.data, texts.len())
    }
}

/// Providers may return entries out of order; `index` restores the input
/// order, and a count mismatch is an error rather than a silent truncation.
pub(crate) fn vectors_in_input_order(
    mut data: Vec<EmbeddingEntry>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    data.sort_by_key(|d| d.index);
    if data.len() != expected {
        return Err(EmbedError::CountMismatch {
            expected,
            got: data.len(),
        });
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
pub(crate) struct EmbeddingEntry {
    pub(crate) index: usize,
    pub(crate) embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_single(
        &self,
        cancel: &CancellationToken,
        text: &str,
    ) -> Result<Vec<f32>, EmbedError> {
        let texts = [text.to_string()];
        let vectors = self.embed(cancel, &texts).await?;
        vectors
            .into_iter()
            .next()
            .ok_or(EmbedError::CountMismatch {
                expected: 1,
                got: 0,
            })
    }

    async fn embed(
        &self,
        cancel: &CancellationToken,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        if cancel.is_cancelled() {
            return Err(EmbedError::Cancelled);
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(EmbedError::Cancelled),
            result = self.request(texts) => result,
        }
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
