use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use uuid::Uuid;

use crate::core::config::CollectionMode;

/// Entries written to the vector index by one ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct CorpusGeneration {
    pub id: Uuid,
    pub source: String,
    pub chunk_count: usize,
    pub char_count: usize,
    pub embedding_model: String,
    pub ingested_at: DateTime<Utc>,
}

/// What chat requests can currently draw on.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorpusSnapshot {
    /// Searchable generations, oldest first.
    pub generations: Vec<CorpusGeneration>,
    /// Raw text from the last `/process-text` call in inline mode.
    pub pasted_text: Option<String>,
}

impl CorpusSnapshot {
    pub fn is_empty(&self) -> bool {
        self.generations.is_empty() && self.pasted_text.is_none()
    }

    pub fn has_indexed(&self) -> bool {
        !self.generations.is_empty()
    }

    pub fn live_ids(&self) -> Vec<Uuid> {
        self.generations.iter().map(|g| g.id).collect()
    }

    pub fn indexed_chunks(&self) -> usize {
        self.generations.iter().map(|g| g.chunk_count).sum()
    }
}

/// Process-wide corpus state.
///
/// Readers take a snapshot; writers go through `commit` or `set_pasted_text`
/// while holding the ingestion lock, so concurrent uploads never interleave.
pub struct CorpusState {
    snapshot: RwLock<CorpusSnapshot>,
    ingest_lock: Mutex<()>,
    next_seq: AtomicU64,
}

impl Default for CorpusState {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusState {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(CorpusSnapshot::default()),
            ingest_lock: Mutex::new(()),
            next_seq: AtomicU64::new(0),
        }
    }

    pub async fn snapshot(&self) -> CorpusSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn lock_ingestion(&self) -> MutexGuard<'_, ()> {
        self.ingest_lock.lock().await
    }

    /// Reserves `count` consecutive sequence numbers and returns the first.
    pub fn reserve_seq(&self, count: usize) -> u64 {
        self.next_seq.fetch_add(count as u64, Ordering::SeqCst)
    }

    /// Makes `generation` searchable. Returns the ids that are no longer live
    /// and whose entries should be removed from the index.
    pub async fn commit(&self, generation: CorpusGeneration, mode: CollectionMode) -> Vec<Uuid> {
        let mut snapshot = self.snapshot.write().await;
        let superseded = match mode {
            CollectionMode::Append => Vec::new(),
            CollectionMode::Replace => snapshot.generations.drain(..).map(|g| g.id).collect(),
        };
        snapshot.generations.push(generation);
        superseded
    }

    /// Replaces the pasted text; only the most recent paste is kept.
    pub async fn set_pasted_text(&self, text: String) {
        self.snapshot.write().await.pasted_text = Some(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generation(source: &str) -> CorpusGeneration {
        CorpusGeneration {
            id: Uuid::new_v4(),
            source: source.to_string(),
            chunk_count: 2,
            char_count: 40,
            embedding_model: "hashing-64".to_string(),
            ingested_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn starts_empty() {
        let state = CorpusState::new();
        let snapshot = state.snapshot().await;
        assert!(snapshot.is_empty());
        assert!(!snapshot.has_indexed());
        assert!(snapshot.live_ids().is_empty());
    }

    #[tokio::test]
    async fn append_keeps_earlier_generations() {
        let state = CorpusState::new();
        let first = generation("a.pdf");
        let second = generation("b.pdf");
        assert!(state.commit(first.clone(), CollectionMode::Append).await.is_empty());
        assert!(state.commit(second.clone(), CollectionMode::Append).await.is_empty());

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.live_ids(), vec![first.id, second.id]);
        assert_eq!(snapshot.indexed_chunks(), 4);
    }

    #[tokio::test]
    async fn replace_returns_superseded_ids() {
        let state = CorpusState::new();
        let first = generation("a.pdf");
        let second = generation("b.pdf");
        state.commit(first.clone(), CollectionMode::Replace).await;
        let superseded = state.commit(second.clone(), CollectionMode::Replace).await;

        assert_eq!(superseded, vec![first.id]);
        assert_eq!(state.snapshot().await.live_ids(), vec![second.id]);
    }

    #[tokio::test]
    async fn pasted_text_alone_makes_corpus_non_empty() {
        let state = CorpusState::new();
        state.set_pasted_text("first".to_string()).await;
        state.set_pasted_text("second".to_string()).await;

        let snapshot = state.snapshot().await;
        assert!(!snapshot.is_empty());
        assert!(!snapshot.has_indexed());
        assert_eq!(snapshot.pasted_text.as_deref(), Some("second"));
    }

    #[test]
    fn sequence_numbers_are_reserved_in_blocks() {
        let state = CorpusState::new();
        assert_eq!(state.reserve_seq(3), 0);
        assert_eq!(state.reserve_seq(2), 3);
        assert_eq!(state.reserve_seq(1), 5);
    }
}
