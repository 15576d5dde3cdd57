use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::state::AppState;

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "RAG Chat API is running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.corpus.snapshot().await;
    let index_entries = match state.index.count().await {
        Ok(count) => Some(count),
        Err(err) => {
            tracing::warn!("Failed to count index entries: {}", err);
            None
        }
    };

    Json(json!({
        "has_content": !snapshot.is_empty(),
        "generations": snapshot.generations,
        "indexed_chunks": snapshot.indexed_chunks(),
        "index_entries": index_entries,
        "pasted_text_length": snapshot.pasted_text.as_ref().map(|t| t.encode_utf16().count()),
        "embedding_model": state.embedding_model,
        "vector_index": state.index.name(),
        "collection_mode": state.config.vector_index.collection_mode,
        "text_ingest_mode": state.config.chat.text_ingest_mode,
        "generator": state.generator_name,
    }))
}
