use std::sync::Arc;
use std::time::Duration;

use super::corpus::CorpusState;
use crate::core::errors::RagError;
use crate::embedding::{EmbedError, EmbeddingProvider};
use crate::vector::{rank_by_score, ScoredEntry, VectorIndex};

/// Top-k similarity search over the live corpus generations.
pub struct ContextRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    corpus: Arc<CorpusState>,
    timeout: Duration,
}

impl ContextRetriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        corpus: Arc<CorpusState>,
        timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            index,
            corpus,
            timeout,
        }
    }

    /// Returns at most `k` entries ordered by descending score, ties in
    /// insertion order. An empty corpus yields an empty result.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredEntry>, RagError> {
        if k == 0 {
            return Err(RagError::Validation(
                "retrieval size must be positive".to_string(),
            ));
        }

        let snapshot = self.corpus.snapshot().await;
        let live_ids = snapshot.live_ids();
        if live_ids.is_empty() {
            return Ok(Vec::new());
        }

        let active = self.embedder.model_id();
        if let Some(stale) = snapshot
            .generations
            .iter()
            .find(|g| g.embedding_model != active)
        {
            return Err(RagError::ModelMismatch {
                indexed: stale.embedding_model.clone(),
                active: active.to_string(),
            });
        }

        let query_vector = tokio::time::timeout(
            self.timeout,
            self.embedder.embed(&[query.to_string()]),
        )
        .await
        .map_err(|_| RagError::retrieval_embed(EmbedError::Timeout))?
        .map_err(RagError::retrieval_embed)?
        .into_iter()
        .next()
        .ok_or_else(|| {
            RagError::retrieval_embed(EmbedError::CountMismatch {
                expected: 1,
                actual: 0,
            })
        })?;

        let mut hits = tokio::time::timeout(
            self.timeout,
            self.index.search(&query_vector, k, &live_ids),
        )
        .await
        .map_err(|_| RagError::Retrieval("vector search timed out".to_string()))?
        .map_err(RagError::retrieval_index)?;

        if let Some(hit) = hits.iter().find(|h| h.payload.embedding_model != active) {
            return Err(RagError::ModelMismatch {
                indexed: hit.payload.embedding_model.clone(),
                active: active.to_string(),
            });
        }

        rank_by_score(&mut hits);
        hits.truncate(k);
        tracing::debug!(k, hits = hits.len(), "context retrieved");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{CollectionMode, RetrievalConfig, TextIngestMode};
    use crate::embedding::HashingEmbedder;
    use crate::rag::ingest::{IngestOptions, Ingestor};
    use crate::vector::InMemoryIndex;

    struct Fixture {
        retriever: ContextRetriever,
        ingestor: Ingestor,
    }

    fn fixture() -> Fixture {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(256));
        let index: Arc<dyn VectorIndex> = Arc::new(InMemoryIndex::new());
        let corpus = Arc::new(CorpusState::new());
        let timeout = Duration::from_secs(5);
        let options = IngestOptions::new(
            &RetrievalConfig {
                max_chunk_chars: 40,
                ..RetrievalConfig::default()
            },
            CollectionMode::Append,
            TextIngestMode::Indexed,
            timeout,
        );
        Fixture {
            retriever: ContextRetriever::new(
                embedder.clone(),
                index.clone(),
                corpus.clone(),
                timeout,
            ),
            ingestor: Ingestor::new(embedder, index, corpus, options),
        }
    }

    #[tokio::test]
    async fn empty_corpus_returns_nothing() {
        let fx = fixture();
        let hits = fx.retriever.retrieve("anything", 3).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn zero_k_is_rejected() {
        let fx = fixture();
        let err = fx.retriever.retrieve("anything", 0).await.unwrap_err();
        assert!(matches!(err, RagError::Validation(_)));
    }

    #[tokio::test]
    async fn returns_at_most_k_in_non_increasing_score_order() {
        let fx = fixture();
        for text in [
            "The capital of France is Paris.",
            "Berlin is the capital of Germany.",
            "Photosynthesis converts light into sugar.",
            "Rust has ownership and borrowing.",
            "Paris hosts the Louvre museum.",
        ] {
            fx.ingestor.ingest_text(text).await.unwrap();
        }

        let hits = fx
            .retriever
            .retrieve("What is the capital of France?", 3)
            .await
            .unwrap();

        assert_eq!(hits.len(), 3);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(hits[0].payload.text, "The capital of France is Paris.");
    }

    #[tokio::test]
    async fn repeated_retrieval_is_identical() {
        let fx = fixture();
        fx.ingestor
            .ingest_text("alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu")
            .await
            .unwrap();

        let first = fx.retriever.retrieve("gamma delta", 2).await.unwrap();
        let second = fx.retriever.retrieve("gamma delta", 2).await.unwrap();

        let texts = |hits: &[ScoredEntry]| {
            hits.iter()
                .map(|h| h.payload.text.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(texts(&first), texts(&second));
    }

    #[tokio::test]
    async fn model_change_fails_fast() {
        let fx = fixture();
        fx.ingestor.ingest_text("indexed with one model").await.unwrap();

        let other = ContextRetriever::new(
            Arc::new(HashingEmbedder::new(128)),
            Arc::new(InMemoryIndex::new()),
            fx.retriever.corpus.clone(),
            Duration::from_secs(5),
        );
        let err = other.retrieve("model", 1).await.unwrap_err();
        assert!(matches!(err, RagError::ModelMismatch { .. }));
    }
}
