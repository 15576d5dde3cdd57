//! Chat orchestration: retrieved context + pasted text → scoped prompt → answer.

mod orchestrator;
mod prompt;

pub use orchestrator::{ChatAnswer, ChatOptions, ChatOrchestrator, SourceRef};
pub use prompt::{assemble_context, system_prompt, PASTED_TEXT_LABEL};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One message of the client-held conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}
