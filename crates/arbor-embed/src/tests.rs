//! Unit tests for embedding providers

use tokio_util::sync::CancellationToken;

use crate::providers::local::{LOCAL_DIMENSION, LocalEmbedder};
use crate::{EmbedError, Embedder};

#[tokio::test]
async fn local_embedder_is_deterministic() {
    let embedder = LocalEmbedder::new();
    let cancel = CancellationToken::new();
    let a = embedder.embed_single(&cancel, "fn main() {}").await.unwrap();
    let b = embedder.embed_single(&cancel, "fn main() {}").await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), LOCAL_DIMENSION);
    assert_eq!(embedder.dimension(), LOCAL_DIMENSION);
}

#[tokio::test]
async fn local_embedder_normalizes() {
    let embedder = LocalEmbedder::new();
    let cancel = CancellationToken::new();
    let v = embedder.embed_single(&cancel, "some text").await.unwrap();
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn local_batch_preserves_order() {
    let embedder = LocalEmbedder::new();
    let cancel = CancellationToken::new();
    let texts = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
    let batch = embedder.embed(&cancel, &texts).await.unwrap();
    assert_eq!(batch.len(), 3);
    for (text, vector) in texts.iter().zip(&batch) {
        let single = embedder.embed_single(&cancel, text).await.unwrap();
        assert_eq!(&single, vector);
    }
}

#[tokio::test]
async fn cancelled_token_fails_promptly() {
    let embedder = LocalEmbedder::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = embedder.embed_single(&cancel, "text").await.unwrap_err();
    assert!(matches!(err, EmbedError::Cancelled));
    let err = embedder.embed(&cancel, &["a".to_string()]).await.unwrap_err();
    assert!(matches!(err, EmbedError::Cancelled));
}

#[test]
fn response_entries_are_reordered_by_index() {
    use crate::providers::openai::{EmbeddingEntry, vectors_in_input_order};

    let shuffled = vec![
        EmbeddingEntry {
            index: 2,
            embedding: vec![2.0],
        },
        EmbeddingEntry {
            index: 0,
            embedding: vec![0.0],
        },
        EmbeddingEntry {
            index: 1,
            embedding: vec![1.0],
        },
    ];
    let vectors = vectors_in_input_order(shuffled, 3).unwrap();
    assert_eq!(vectors, vec![vec![0.0], vec![1.0], vec![2.0]]);

    let short = vec![EmbeddingEntry {
        index: 0,
        embedding: vec![0.0],
    }];
    let err = vectors_in_input_order(short, 2).unwrap_err();
    assert!(matches!(
        err,
        EmbedError::CountMismatch {
            expected: 2,
            got: 1
        }
    ));
}

#[tokio::test]
async fn empty_text_embeds_to_zero_vector() {
    let embedder = LocalEmbedder::new();
    let cancel = CancellationToken::new();
    let v = embedder.embed_single(&cancel, "").await.unwrap();
    assert!(v.iter().all(|x| *x == 0.0));
}
