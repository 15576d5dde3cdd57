//! Embedding providers.
//!
//! - `OpenAiEmbedder`: OpenAI-compatible `/embeddings` endpoint
//! - `HashingEmbedder`: deterministic offline embeddings for local runs and tests

mod hashing;
mod openai;

pub use hashing::HashingEmbedder;
pub use openai::OpenAiEmbedder;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("provider returned {actual} embeddings for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("batch of {size} exceeds configured max {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("timed out")]
    Timeout,
}

/// Maps text to fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier stored next to every vector, compared at query time.
    fn model_id(&self) -> &str;

    /// Maximum inputs accepted by a single `embed` call.
    fn batch_size(&self) -> usize;

    /// Returns one vector per input, in input order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// Embeds any number of inputs by splitting them into provider-sized batches.
pub async fn embed_all(
    provider: &dyn EmbeddingProvider,
    inputs: &[String],
) -> Result<Vec<Vec<f32>>, EmbedError> {
    let batch_size = provider.batch_size().max(1);
    let mut vectors = Vec::with_capacity(inputs.len());
    for batch in inputs.chunks(batch_size) {
        let embedded = provider.embed(batch).await?;
        if embedded.len() != batch.len() {
            return Err(EmbedError::CountMismatch {
                expected: batch.len(),
                actual: embedded.len(),
            });
        }
        vectors.extend(embedded);
    }
    Ok(vectors)
}
