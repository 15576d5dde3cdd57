use thiserror::Error;

use crate::embedding::EmbedError;
use crate::llm::ProviderError;
use crate::vector::IndexError;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Missing required credential: {0}")]
    MissingCredential(&'static str),

    #[error("Failed to initialize embedding provider: {0}")]
    Embedding(#[source] EmbedError),

    #[error("Failed to initialize vector index: {0}")]
    VectorIndex(#[source] IndexError),

    #[error("Failed to initialize answer generator: {0}")]
    Generation(#[source] ProviderError),
}
