//! Answer generation.
//!
//! - `AnswerGenerator`: turns an assembled message list into a reply
//! - `OpenAiGenerator`: OpenAI-compatible `/chat/completions` client

mod openai;
pub mod provider;
pub mod types;

pub use openai::OpenAiGenerator;
pub use provider::{AnswerGenerator, ProviderError};
pub use types::{ChatMessage, GenerationRequest};
