//! Vector index backends.
//!
//! - `VectorIndex`: storage + nearest-neighbor search over [`IndexEntry`]s
//! - `QdrantIndex`: Qdrant REST API
//! - `InMemoryIndex`: process-local index for offline runs and tests

mod math;
mod memory;
mod qdrant;

pub use math::{cosine_similarity, rank_by_score};
pub use memory::InMemoryIndex;
pub use qdrant::QdrantIndex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("index returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("vector dimension {actual} does not match collection dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("collection has not been created yet")]
    MissingCollection,
}

/// Metadata stored next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPayload {
    pub text: String,
    /// Ingestion that wrote the entry.
    pub corpus_id: Uuid,
    /// Process-wide insertion order; breaks score ties.
    pub seq: u64,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default)]
    pub offset: usize,
    pub embedding_model: String,
}

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: EntryPayload,
}

#[derive(Debug, Clone)]
pub struct ScoredEntry {
    /// Cosine similarity, higher is closer.
    pub score: f32,
    pub payload: EntryPayload,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name for logs and status output.
    fn name(&self) -> &str;

    /// Creates the collection with the given dimension, or verifies that an
    /// existing one matches it.
    async fn ensure_collection(&self, dimension: usize) -> Result<(), IndexError>;

    /// Writes entries; every vector must match the collection dimension.
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<(), IndexError>;

    /// Top `limit` entries belonging to `corpus_ids`, ordered by descending
    /// score then ascending `seq`.
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        corpus_ids: &[Uuid],
    ) -> Result<Vec<ScoredEntry>, IndexError>;

    /// Removes every entry written by the given ingestions.
    async fn delete_corpus(&self, corpus_ids: &[Uuid]) -> Result<(), IndexError>;

    async fn count(&self) -> Result<usize, IndexError>;
}
