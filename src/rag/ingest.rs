use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::chunker::{split_unit, DocumentChunk};
use super::corpus::{CorpusGeneration, CorpusState};
use super::pdf::{extract_pages, StagedUpload};
use crate::core::config::{CollectionMode, RetrievalConfig, TextIngestMode};
use crate::core::errors::RagError;
use crate::embedding::{embed_all, EmbedError, EmbeddingProvider};
use crate::vector::{EntryPayload, IndexEntry, IndexError, VectorIndex};

/// Label stored on entries that came from `/process-text`.
pub const PASTED_TEXT_SOURCE: &str = "pasted-text";

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// `None` when the text was kept inline instead of indexed.
    pub corpus_id: Option<Uuid>,
    pub chunk_count: usize,
    pub char_count: usize,
    /// Page count of the source PDF.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub max_chunk_chars: usize,
    pub chunk_overlap: usize,
    pub collection_mode: CollectionMode,
    pub text_mode: TextIngestMode,
    pub timeout: Duration,
}

impl IngestOptions {
    pub fn new(
        retrieval: &RetrievalConfig,
        collection_mode: CollectionMode,
        text_mode: TextIngestMode,
        timeout: Duration,
    ) -> Self {
        Self {
            max_chunk_chars: retrieval.max_chunk_chars,
            chunk_overlap: retrieval.chunk_overlap,
            collection_mode,
            text_mode,
            timeout,
        }
    }
}

/// Turns PDFs and pasted text into searchable index entries.
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    corpus: Arc<CorpusState>,
    options: IngestOptions,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        corpus: Arc<CorpusState>,
        options: IngestOptions,
    ) -> Self {
        Self {
            embedder,
            index,
            corpus,
            options,
        }
    }

    /// Extracts a staged PDF page by page and indexes the text.
    pub async fn ingest_pdf(
        &self,
        upload: &StagedUpload,
        filename: &str,
    ) -> Result<IngestReport, RagError> {
        let path: PathBuf = upload.path().to_path_buf();
        let text = tokio::task::spawn_blocking(move || extract_pages(&path))
            .await
            .map_err(|err| RagError::Ingestion(format!("PDF extraction task failed: {err}")))??;

        let chunks: Vec<DocumentChunk> = text
            .pages
            .iter()
            .flat_map(|(page, body)| {
                split_unit(
                    body,
                    Some(*page),
                    self.options.max_chunk_chars,
                    self.options.chunk_overlap,
                )
            })
            .collect();

        let mut report = self
            .index_chunks(filename, chunks, text.char_count())
            .await?;
        report.pages = Some(text.page_count);
        Ok(report)
    }

    /// Stores pasted text, either inline for the prompt or as indexed chunks.
    pub async fn ingest_text(&self, text: &str) -> Result<IngestReport, RagError> {
        if text.trim().is_empty() {
            return Err(RagError::Validation("No text provided".to_string()));
        }
        let char_count = text.chars().count();

        match self.options.text_mode {
            TextIngestMode::Inline => {
                let _guard = self.corpus.lock_ingestion().await;
                self.corpus.set_pasted_text(text.to_string()).await;
                tracing::info!(chars = char_count, "pasted text stored inline");
                Ok(IngestReport {
                    corpus_id: None,
                    chunk_count: 1,
                    char_count,
                    pages: None,
                })
            }
            TextIngestMode::Indexed => {
                let chunks = split_unit(
                    text,
                    None,
                    self.options.max_chunk_chars,
                    self.options.chunk_overlap,
                );
                self.index_chunks(PASTED_TEXT_SOURCE, chunks, char_count)
                    .await
            }
        }
    }

    async fn index_chunks(
        &self,
        source: &str,
        chunks: Vec<DocumentChunk>,
        char_count: usize,
    ) -> Result<IngestReport, RagError> {
        if chunks.is_empty() {
            return Err(RagError::Validation(format!(
                "{source} contains no text to index"
            )));
        }

        let _guard = self.corpus.lock_ingestion().await;

        let inputs: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = tokio::time::timeout(
            self.options.timeout,
            embed_all(self.embedder.as_ref(), &inputs),
        )
        .await
        .map_err(|_| RagError::ingestion_embed(EmbedError::Timeout))?
        .map_err(RagError::ingestion_embed)?;

        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 {
            return Err(RagError::Ingestion(
                "embedding provider returned empty vectors".to_string(),
            ));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(RagError::ingestion_index(IndexError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            }));
        }

        let corpus_id = Uuid::new_v4();
        let model = self.embedder.model_id().to_string();
        let first_seq = self.corpus.reserve_seq(chunks.len());
        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (chunk, vector))| IndexEntry {
                id: Uuid::new_v4(),
                vector,
                payload: EntryPayload {
                    text: chunk.text,
                    corpus_id,
                    seq: first_seq + i as u64,
                    source: source.to_string(),
                    page: chunk.page,
                    offset: chunk.offset,
                    embedding_model: model.clone(),
                },
            })
            .collect();
        let chunk_count = entries.len();

        let written = tokio::time::timeout(self.options.timeout, async {
            self.index.ensure_collection(dimension).await?;
            self.index.upsert(entries).await
        })
        .await;
        let failure = match written {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(RagError::ingestion_index(err)),
            Err(_) => Some(RagError::Ingestion("vector index write timed out".to_string())),
        };
        if let Some(err) = failure {
            tracing::warn!(%corpus_id, source, "embeddings computed but not indexed: {err}");
            self.discard(&[corpus_id]).await;
            return Err(err);
        }

        let superseded = self
            .corpus
            .commit(
                CorpusGeneration {
                    id: corpus_id,
                    source: source.to_string(),
                    chunk_count,
                    char_count,
                    embedding_model: model,
                    ingested_at: Utc::now(),
                },
                self.options.collection_mode,
            )
            .await;
        if !superseded.is_empty() {
            self.discard(&superseded).await;
        }

        tracing::info!(
            %corpus_id,
            source,
            chunks = chunk_count,
            chars = char_count,
            index = self.index.name(),
            "ingestion committed"
        );

        Ok(IngestReport {
            corpus_id: Some(corpus_id),
            chunk_count,
            char_count,
            pages: None,
        })
    }

    /// Best-effort removal of entries that are not (or no longer) live.
    async fn discard(&self, corpus_ids: &[Uuid]) {
        let removal = tokio::time::timeout(self.options.timeout, self.index.delete_corpus(corpus_ids));
        match removal.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(?corpus_ids, "failed to remove index entries: {err}");
            }
            Err(_) => {
                tracing::warn!(?corpus_ids, "timed out removing index entries");
            }
        }
    }
}
