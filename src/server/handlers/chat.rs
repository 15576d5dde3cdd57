use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::utils::{pipeline_error, ApiJson};
use crate::chat::ChatTurn;
use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.check_rate_limit()?;

    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("No message provided".to_string()));
    }

    let answer = state
        .chat
        .answer(&payload.message, &payload.history)
        .await
        .map_err(|err| pipeline_error(err, "Failed to generate response"))?;

    Ok(Json(json!({
        "response": answer.content,
        "hasContext": answer.used_context,
        "sources": answer.sources,
    })))
}
