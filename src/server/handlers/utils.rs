use axum::extract::FromRequest;

use crate::core::errors::{ApiError, RagError};

/// `axum::Json` whose rejections render as `{"error": ...}` like every other failure.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Client errors pass through with their message. Anything else is logged in
/// full and answered with `public` so provider details never reach the client.
pub fn pipeline_error(err: RagError, public: &str) -> ApiError {
    if err.is_client_error() {
        return err.into();
    }
    tracing::error!("{}: {}", public, err);
    ApiError::Internal(public.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_message() {
        let err = pipeline_error(RagError::Validation("No text provided".into()), "Failed");
        assert!(matches!(err, ApiError::BadRequest(msg) if msg == "No text provided"));
    }

    #[test]
    fn server_errors_are_replaced_by_public_message() {
        let err = pipeline_error(
            RagError::Ingestion("qdrant returned 503: secret detail".into()),
            "Failed to process PDF",
        );
        assert!(matches!(err, ApiError::Internal(msg) if msg == "Failed to process PDF"));
    }
}
