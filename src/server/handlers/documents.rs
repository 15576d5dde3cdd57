use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::utils::{pipeline_error, ApiJson};
use crate::core::errors::ApiError;
use crate::rag::{ensure_pdf, StagedUpload};
use crate::state::AppState;

const PDF_FIELD: &str = "pdf";

#[derive(Debug, Deserialize)]
pub struct ProcessTextRequest {
    #[serde(default)]
    pub text: String,
}

struct UploadedFile {
    filename: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

async fn read_pdf_field(multipart: &mut Multipart) -> Result<Option<UploadedFile>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(PDF_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "document.pdf".to_string());
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        return Ok(Some(UploadedFile {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        }));
    }
    Ok(None)
}

pub async fn upload_pdf(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    state.check_rate_limit()?;

    let mut multipart = multipart?;
    let upload = read_pdf_field(&mut multipart)
        .await?
        .ok_or_else(|| ApiError::BadRequest("No PDF file provided".to_string()))?;

    ensure_pdf(upload.content_type.as_deref(), &upload.bytes).map_err(|err| {
        tracing::info!(filename = %upload.filename, "Rejected upload: {}", err);
        ApiError::from(err)
    })?;

    let staged = StagedUpload::write(&state.paths.upload_dir, &upload.bytes)
        .map_err(|err| pipeline_error(err, "Failed to process PDF"))?;
    let report = state
        .ingestor
        .ingest_pdf(&staged, &upload.filename)
        .await
        .map_err(|err| pipeline_error(err, "Failed to process PDF"))?;

    Ok(Json(json!({
        "message": "PDF uploaded and processed successfully",
        "pages": report.pages.unwrap_or(0),
        "filename": upload.filename,
        "chunks": report.chunk_count,
    })))
}

pub async fn process_text(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<ProcessTextRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.check_rate_limit()?;

    if payload.text.trim().is_empty() {
        return Err(ApiError::BadRequest("No text provided".to_string()));
    }

    state
        .ingestor
        .ingest_text(&payload.text)
        .await
        .map_err(|err| pipeline_error(err, "Failed to process text"))?;

    Ok(Json(json!({
        "message": "Text processed successfully",
        // UTF-16 code units, matching JavaScript's `String.length`.
        "length": payload.text.encode_utf16().count(),
    })))
}
