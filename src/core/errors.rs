use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

use crate::embedding::EmbedError;
use crate::llm::ProviderError;
use crate::vector::IndexError;

/// Message returned when a chat arrives before any document or text was loaded.
pub const NO_CONTEXT_MESSAGE: &str =
    "No document or text content available. Please upload a PDF or enter text first.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("too many requests")]
    TooManyRequests,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Body-limit overruns surface as 413; every other malformed body is a 400.
    fn from_rejection(status: StatusCode, message: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(message)
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        let message = format!("Invalid multipart body: {}", err.body_text());
        ApiError::from_rejection(err.status(), message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::UnsupportedMediaType(msg) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg.clone())
            }
            ApiError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large".to_string(),
            ),
            ApiError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_string(),
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

/// Failures of the ingest → retrieve → generate pipeline.
///
/// Each external stage has its own error type (`EmbedError`, `IndexError`,
/// `ProviderError`); the pipeline step that observed the failure decides which
/// variant it becomes here.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("{0}")]
    Validation(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("ingestion failed: {0}")]
    Ingestion(String),

    #[error("{}", NO_CONTEXT_MESSAGE)]
    NoContextAvailable,

    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("index entries were embedded with `{indexed}` but the active model is `{active}`")]
    ModelMismatch { indexed: String, active: String },

    #[error("generation failed: {0}")]
    Generation(String),
}

impl RagError {
    pub fn ingestion_embed(err: EmbedError) -> Self {
        RagError::Ingestion(format!("embedding provider: {err}"))
    }

    pub fn ingestion_index(err: IndexError) -> Self {
        RagError::Ingestion(format!("vector index: {err}"))
    }

    pub fn retrieval_embed(err: EmbedError) -> Self {
        RagError::Retrieval(format!("embedding provider: {err}"))
    }

    pub fn retrieval_index(err: IndexError) -> Self {
        RagError::Retrieval(format!("vector index: {err}"))
    }

    pub fn generation(err: ProviderError) -> Self {
        RagError::Generation(err.to_string())
    }

    /// Client errors keep their message; server-side failures are logged in
    /// full by the handler and reported with a fixed public message.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RagError::Validation(_) | RagError::UnsupportedFormat(_) | RagError::NoContextAvailable
        )
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Validation(msg) => ApiError::BadRequest(msg),
            RagError::UnsupportedFormat(msg) => ApiError::UnsupportedMediaType(msg),
            RagError::NoContextAvailable => ApiError::BadRequest(NO_CONTEXT_MESSAGE.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_context_maps_to_bad_request() {
        let api: ApiError = RagError::NoContextAvailable.into();
        let response = api.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unsupported_format_maps_to_415() {
        let api: ApiError = RagError::UnsupportedFormat("text/plain".into()).into();
        assert_eq!(
            api.into_response().status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
    }

    #[test]
    fn generation_failure_is_internal() {
        let err = RagError::generation(ProviderError::EmptyResponse);
        assert!(!err.is_client_error());
        let api: ApiError = err.into();
        assert_eq!(
            api.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn payload_too_large_maps_to_413() {
        assert_eq!(
            ApiError::PayloadTooLarge.into_response().status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        let err = ApiError::from_rejection(StatusCode::PAYLOAD_TOO_LARGE, "limit".into());
        assert!(matches!(err, ApiError::PayloadTooLarge));
    }

    #[test]
    fn other_rejections_become_bad_requests() {
        for status in [
            StatusCode::UNPROCESSABLE_ENTITY,
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            StatusCode::BAD_REQUEST,
        ] {
            let err = ApiError::from_rejection(status, "Failed to parse".into());
            assert!(matches!(err, ApiError::BadRequest(ref msg) if msg == "Failed to parse"));
        }
    }

    #[test]
    fn validation_keeps_its_message() {
        let api: ApiError = RagError::Validation("No text provided".into()).into();
        match api {
            ApiError::BadRequest(msg) => assert_eq!(msg, "No text provided"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
