use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::prompt::{assemble_context, system_prompt};
use super::{ChatRole, ChatTurn};
use crate::core::config::AppConfig;
use crate::core::errors::RagError;
use crate::llm::{AnswerGenerator, ChatMessage, GenerationRequest, ProviderError};
use crate::rag::{ContextRetriever, CorpusState};

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub top_k: usize,
    pub history_turns: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl ChatOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            history_turns: config.chat.history_turns,
            max_tokens: config.generation.max_tokens,
            temperature: config.generation.temperature,
            timeout: config.timeouts.request_timeout(),
        }
    }
}

/// Where a retrieved passage came from.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct ChatAnswer {
    /// Generator output, unmodified.
    pub content: String,
    pub used_context: bool,
    pub sources: Vec<SourceRef>,
}

pub struct ChatOrchestrator {
    retriever: Arc<ContextRetriever>,
    generator: Arc<dyn AnswerGenerator>,
    corpus: Arc<CorpusState>,
    options: ChatOptions,
}

impl ChatOrchestrator {
    pub fn new(
        retriever: Arc<ContextRetriever>,
        generator: Arc<dyn AnswerGenerator>,
        corpus: Arc<CorpusState>,
        options: ChatOptions,
    ) -> Self {
        Self {
            retriever,
            generator,
            corpus,
            options,
        }
    }

    /// retrieve → assemble → generate.
    ///
    /// Fails with `NoContextAvailable` before touching the generator when
    /// neither indexed content nor pasted text exists.
    pub async fn answer(&self, query: &str, history: &[ChatTurn]) -> Result<ChatAnswer, RagError> {
        if query.trim().is_empty() {
            return Err(RagError::Validation("No message provided".to_string()));
        }

        let snapshot = self.corpus.snapshot().await;
        let retrieved = if snapshot.has_indexed() {
            self.retriever.retrieve(query, self.options.top_k).await?
        } else {
            Vec::new()
        };

        let context = assemble_context(&retrieved, snapshot.pasted_text.as_deref());
        if context.is_empty() {
            return Err(RagError::NoContextAvailable);
        }

        let mut messages = vec![ChatMessage::system(system_prompt(&context))];
        let skip = history.len().saturating_sub(self.options.history_turns);
        messages.extend(history.iter().skip(skip).map(|turn| match turn.role {
            ChatRole::User => ChatMessage::user(turn.content.clone()),
            ChatRole::Assistant => ChatMessage::assistant(turn.content.clone()),
        }));
        messages.push(ChatMessage::user(query));

        let request =
            GenerationRequest::new(messages, self.options.max_tokens, self.options.temperature);
        let content = tokio::time::timeout(self.options.timeout, self.generator.generate(request))
            .await
            .map_err(|_| RagError::generation(ProviderError::Timeout))?
            .map_err(RagError::generation)?;

        tracing::info!(
            retrieved = retrieved.len(),
            pasted = snapshot.pasted_text.is_some(),
            generator = self.generator.name(),
            "answer generated"
        );

        Ok(ChatAnswer {
            content,
            used_context: true,
            sources: retrieved
                .into_iter()
                .map(|hit| SourceRef {
                    source: hit.payload.source,
                    page: hit.payload.page,
                    score: hit.score,
                })
                .collect(),
        })
    }
}
