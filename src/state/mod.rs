use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

use crate::chat::{ChatOptions, ChatOrchestrator};
use crate::core::config::{AppConfig, AppPaths, EmbeddingBackend, VectorBackend};
use crate::core::errors::ApiError;
use crate::embedding::{EmbeddingProvider, HashingEmbedder, OpenAiEmbedder};
use crate::llm::{AnswerGenerator, OpenAiGenerator};
use crate::rag::{ContextRetriever, CorpusState, IngestOptions, Ingestor};
use crate::vector::{InMemoryIndex, QdrantIndex, VectorIndex};

pub mod error;

use error::InitializationError;

/// Application state shared across all routes.
///
/// Holds the configuration, the single process-wide corpus and the pipeline
/// components built on top of it.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub paths: Arc<AppPaths>,
    pub corpus: Arc<CorpusState>,
    pub ingestor: Ingestor,
    pub chat: ChatOrchestrator,
    pub embedding_model: String,
    pub index: Arc<dyn VectorIndex>,
    pub generator_name: String,
    rate_limiter: Option<DefaultDirectRateLimiter>,
}

impl AppState {
    /// Builds the configured providers. Missing credentials for a remote
    /// provider are fatal.
    pub fn initialize(
        config: AppConfig,
        paths: Arc<AppPaths>,
    ) -> Result<Arc<Self>, InitializationError> {
        let timeout = config.timeouts.request_timeout();

        let embedder: Arc<dyn EmbeddingProvider> = match config.embedding.provider {
            EmbeddingBackend::OpenAi => {
                let key = require_key(
                    &config.embedding.api_key,
                    "embedding.api_key (OPENAI_API_KEY)",
                )?;
                Arc::new(
                    OpenAiEmbedder::new(key, &config.embedding, timeout)
                        .map_err(InitializationError::Embedding)?,
                )
            }
            EmbeddingBackend::Hashing => {
                Arc::new(HashingEmbedder::new(config.embedding.hashing_dimension))
            }
        };

        let index: Arc<dyn VectorIndex> = match config.vector_index.backend {
            VectorBackend::Qdrant => Arc::new(
                QdrantIndex::new(&config.vector_index, timeout)
                    .map_err(InitializationError::VectorIndex)?,
            ),
            VectorBackend::Memory => Arc::new(InMemoryIndex::new()),
        };

        let generator: Arc<dyn AnswerGenerator> = {
            let key = require_key(
                &config.generation.api_key,
                "generation.api_key (OPENAI_API_KEY)",
            )?;
            Arc::new(
                OpenAiGenerator::new(key, &config.generation, timeout)
                    .map_err(InitializationError::Generation)?,
            )
        };

        tracing::info!(
            embedding = embedder.model_id(),
            index = index.name(),
            generator = generator.name(),
            "providers initialized"
        );

        Ok(Arc::new(Self::from_components(
            config, paths, embedder, index, generator,
        )))
    }

    /// Wires already-built providers together.
    pub fn from_components(
        config: AppConfig,
        paths: Arc<AppPaths>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        let timeout = config.timeouts.request_timeout();
        let corpus = Arc::new(CorpusState::new());

        let ingestor = Ingestor::new(
            embedder.clone(),
            index.clone(),
            corpus.clone(),
            IngestOptions::new(
                &config.retrieval,
                config.vector_index.collection_mode,
                config.chat.text_ingest_mode,
                timeout,
            ),
        );
        let retriever = Arc::new(ContextRetriever::new(
            embedder.clone(),
            index.clone(),
            corpus.clone(),
            timeout,
        ));
        let generator_name = generator.name().to_string();
        let chat = ChatOrchestrator::new(
            retriever,
            generator,
            corpus.clone(),
            ChatOptions::from_config(&config),
        );

        let rate_limiter = NonZeroU32::new(config.server.max_requests_per_minute)
            .map(|limit| RateLimiter::direct(Quota::per_minute(limit)));

        Self {
            embedding_model: embedder.model_id().to_string(),
            config: Arc::new(config),
            paths,
            corpus,
            ingestor,
            chat,
            index,
            generator_name,
            rate_limiter,
        }
    }

    pub fn check_rate_limit(&self) -> Result<(), ApiError> {
        match &self.rate_limiter {
            Some(limiter) if limiter.check().is_err() => Err(ApiError::TooManyRequests),
            _ => Ok(()),
        }
    }
}

fn require_key<'a>(
    value: &'a Option<String>,
    name: &'static str,
) -> Result<&'a str, InitializationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(InitializationError::MissingCredential(name))
}
