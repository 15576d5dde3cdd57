use async_trait::async_trait;
use thiserror::Error;

use super::types::GenerationRequest;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("provider returned no answer content")]
    EmptyResponse,

    #[error("timed out")]
    Timeout,
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Model name for logs and status output.
    fn name(&self) -> &str;

    /// Returns the assistant reply verbatim.
    async fn generate(&self, request: GenerationRequest) -> Result<String, ProviderError>;
}
