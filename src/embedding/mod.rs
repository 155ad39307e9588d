//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait, an OpenAI-compatible HTTP
//! implementation, the bounded call helpers every caller goes through
//! ([`embed_bounded`], [`embed_batch_bounded`]), cosine similarity, and the
//! blob codec used to persist vectors in SQLite.

pub mod openai;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::ProviderError;

/// Trait for embedding text into fixed-length vectors.
///
/// Implementations must return vectors of exactly [`EmbeddingProvider::dimensions`]
/// entries. Callers never invoke these methods directly; they go through
/// [`embed_bounded`] / [`embed_batch_bounded`] so every call carries a timeout.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier recorded alongside stored vectors.
    fn model(&self) -> &str;

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;

    /// Embed a single text string into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Embed a batch of texts, one vector per input in input order.
    /// Implementations may override for batched requests.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Create an embedding provider from config.
///
/// Currently only `"openai"` (any OpenAI-compatible `/embeddings` endpoint) is supported.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(openai::OpenAiEmbeddings::new(config)?)),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: openai"),
    }
}

/// Embed one text, bounded by `timeout`, and check the vector's dimensionality.
pub async fn embed_bounded(
    provider: &dyn EmbeddingProvider,
    text: &str,
    timeout: Duration,
) -> Result<Vec<f32>, ProviderError> {
    let vector = tokio::time::timeout(timeout, provider.embed(text))
        .await
        .map_err(|_| ProviderError::Timeout(timeout))??;
    check_dimensions(&vector, provider.dimensions())?;
    Ok(vector)
}

/// Embed a batch, bounded by `timeout`. Checks the response count but leaves
/// per-vector dimension checks to the caller so one bad vector can be skipped.
pub async fn embed_batch_bounded(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    timeout: Duration,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let vectors = tokio::time::timeout(timeout, provider.embed_batch(texts))
        .await
        .map_err(|_| ProviderError::Timeout(timeout))??;
    if vectors.len() != texts.len() {
        return Err(ProviderError::Malformed(format!(
            "requested {} embeddings, received {}",
            texts.len(),
            vectors.len()
        )));
    }
    Ok(vectors)
}

pub fn check_dimensions(vector: &[f32], expected: usize) -> Result<(), ProviderError> {
    if vector.len() != expected {
        return Err(ProviderError::Dimension {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Cosine similarity between two vectors.
///
/// Returns `None` when the lengths differ or either vector has zero norm, so the
/// caller can treat the pair as incomparable instead of inventing a score.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    Some(dot / (norm_a * norm_b))
}

/// Encode a vector as little-endian `f32` bytes for the `embedding` BLOB column.
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`encode_embedding`].
pub fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}
