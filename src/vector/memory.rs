use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::math::{cosine_similarity, rank_by_score};
use super::{IndexEntry, IndexError, ScoredEntry, VectorIndex};

#[derive(Default)]
struct Collection {
    dimension: Option<usize>,
    entries: Vec<IndexEntry>,
}

/// Brute-force cosine index held in process memory. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryIndex {
    collection: RwLock<Collection>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ensure_collection(&self, dimension: usize) -> Result<(), IndexError> {
        let mut collection = self.collection.write().await;
        match collection.dimension {
            Some(expected) if expected != dimension => Err(IndexError::DimensionMismatch {
                expected,
                actual: dimension,
            }),
            Some(_) => Ok(()),
            None => {
                collection.dimension = Some(dimension);
                Ok(())
            }
        }
    }

    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<(), IndexError> {
        let mut collection = self.collection.write().await;
        let dimension = collection.dimension.ok_or(IndexError::MissingCollection)?;
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != dimension) {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                actual: bad.vector.len(),
            });
        }
        for entry in entries {
            match collection.entries.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry,
                None => collection.entries.push(entry),
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        corpus_ids: &[Uuid],
    ) -> Result<Vec<ScoredEntry>, IndexError> {
        let collection = self.collection.read().await;
        let Some(dimension) = collection.dimension else {
            return Ok(Vec::new());
        };
        if vector.len() != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }

        let mut hits = Vec::new();
        for entry in collection
            .entries
            .iter()
            .filter(|e| corpus_ids.contains(&e.payload.corpus_id))
        {
            hits.push(ScoredEntry {
                score: cosine_similarity(vector, &entry.vector)?,
                payload: entry.payload.clone(),
            });
        }
        rank_by_score(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_corpus(&self, corpus_ids: &[Uuid]) -> Result<(), IndexError> {
        let mut collection = self.collection.write().await;
        collection
            .entries
            .retain(|e| !corpus_ids.contains(&e.payload.corpus_id));
        Ok(())
    }

    async fn count(&self) -> Result<usize, IndexError> {
        Ok(self.collection.read().await.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::EntryPayload;

    fn entry(corpus_id: Uuid, seq: u64, text: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            id: Uuid::new_v4(),
            vector,
            payload: EntryPayload {
                text: text.to_string(),
                corpus_id,
                seq,
                source: "test".to_string(),
                page: None,
                offset: 0,
                embedding_model: "test-model".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn search_orders_by_score_and_respects_limit() {
        let index = InMemoryIndex::new();
        let corpus = Uuid::new_v4();
        index.ensure_collection(3).await.unwrap();
        index
            .upsert(vec![
                entry(corpus, 0, "sky", vec![0.9, 0.1, 0.0]),
                entry(corpus, 1, "ocean", vec![0.5, 0.5, 0.0]),
                entry(corpus, 2, "math", vec![0.0, 0.1, 0.9]),
            ])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0, 0.0], 2, &[corpus]).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].payload.text, "sky");
        assert_eq!(hits[1].payload.text, "ocean");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn equal_scores_come_back_in_insertion_order() {
        let index = InMemoryIndex::new();
        let corpus = Uuid::new_v4();
        index.ensure_collection(2).await.unwrap();
        index
            .upsert(vec![
                entry(corpus, 7, "second", vec![1.0, 0.0]),
                entry(corpus, 3, "first", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 5, &[corpus]).await.unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.payload.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn search_only_sees_requested_corpora() {
        let index = InMemoryIndex::new();
        let live = Uuid::new_v4();
        let stale = Uuid::new_v4();
        index.ensure_collection(2).await.unwrap();
        index
            .upsert(vec![
                entry(stale, 0, "old", vec![1.0, 0.0]),
                entry(live, 1, "new", vec![0.8, 0.2]),
            ])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 5, &[live]).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload.text, "new");
    }

    #[tokio::test]
    async fn dimension_mismatch_fails_instead_of_truncating() {
        let index = InMemoryIndex::new();
        let corpus = Uuid::new_v4();
        index.ensure_collection(3).await.unwrap();

        let err = index
            .upsert(vec![entry(corpus, 0, "short", vec![1.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));

        assert!(index.ensure_collection(4).await.is_err());
        assert!(index.search(&[1.0], 1, &[corpus]).await.is_err());
    }

    #[tokio::test]
    async fn upsert_before_collection_exists_fails() {
        let index = InMemoryIndex::new();
        let err = index
            .upsert(vec![entry(Uuid::new_v4(), 0, "x", vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::MissingCollection));
    }

    #[tokio::test]
    async fn delete_corpus_removes_only_that_generation() {
        let index = InMemoryIndex::new();
        let keep = Uuid::new_v4();
        let drop = Uuid::new_v4();
        index.ensure_collection(1).await.unwrap();
        index
            .upsert(vec![
                entry(keep, 0, "keep", vec![1.0]),
                entry(drop, 1, "drop", vec![1.0]),
            ])
            .await
            .unwrap();

        index.delete_corpus(&[drop]).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_index_returns_no_hits() {
        let index = InMemoryIndex::new();
        let hits = index.search(&[1.0, 0.0], 3, &[Uuid::new_v4()]).await.unwrap();
        assert!(hits.is_empty());
    }
}
