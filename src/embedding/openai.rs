//! OpenAI-compatible embeddings client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{EmbedError, EmbeddingProvider};
use crate::core::config::EmbeddingConfig;
use crate::core::retry::{backoff_delay, is_retryable_error, is_retryable_status};

#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    max_retries: u32,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: &str,
        config: &EmbeddingConfig,
        timeout: Duration,
    ) -> Result<Self, EmbedError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| EmbedError::Http("invalid OpenAI API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| EmbedError::Http(format!("failed to build HTTP client: {err}")))?;
        let endpoint = format!("{}/embeddings", config.base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            dimensions: config.dimensions,
            max_retries: config.max_retries,
            batch_size: config.batch_size.max(1),
        })
    }

    async fn send_once(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, Attempt> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.dimensions,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                let retryable = is_retryable_error(&err);
                let error = if err.is_timeout() {
                    EmbedError::Timeout
                } else {
                    EmbedError::Http(err.to_string())
                };
                Attempt { error, retryable }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Attempt {
                error: EmbedError::Status {
                    status: status.as_u16(),
                    body,
                },
                retryable: is_retryable_status(status),
            });
        }

        let mut parsed: EmbeddingResponse = resp.json().await.map_err(|err| Attempt {
            error: EmbedError::Decode(err.to_string()),
            retryable: false,
        })?;
        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != inputs.len() {
            return Err(Attempt {
                error: EmbedError::CountMismatch {
                    expected: inputs.len(),
                    actual: parsed.data.len(),
                },
                retryable: false,
            });
        }
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

struct Attempt {
    error: EmbedError,
    retryable: bool,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        if inputs.len() > self.batch_size {
            return Err(EmbedError::BatchTooLarge {
                size: inputs.len(),
                max: self.batch_size,
            });
        }

        let mut attempt = 0u32;
        loop {
            match self.send_once(inputs).await {
                Ok(vectors) => return Ok(vectors),
                Err(failed) if failed.retryable && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "embedding request failed, retrying: {}",
                        failed.error
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failed) => return Err(failed.error),
            }
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::core::testing;

    /// Fails the first `failures` calls with `status`, then answers normally.
    #[derive(Clone)]
    struct Upstream {
        hits: Arc<AtomicUsize>,
        failures: usize,
        status: StatusCode,
    }

    async fn embeddings(State(upstream): State<Upstream>) -> Response {
        let seen = upstream.hits.fetch_add(1, Ordering::SeqCst);
        if seen < upstream.failures {
            return (upstream.status, "upstream unavailable").into_response();
        }
        Json(json!({
            "data": [
                { "embedding": [0.0, 1.0], "index": 1 },
                { "embedding": [1.0, 0.0], "index": 0 }
            ]
        }))
        .into_response()
    }

    async fn embedder(
        status: StatusCode,
        failures: usize,
        max_retries: u32,
    ) -> (OpenAiEmbedder, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/v1/embeddings", post(embeddings))
            .with_state(Upstream {
                hits: hits.clone(),
                failures,
                status,
            });
        let base = testing::serve(app).await;
        let config = EmbeddingConfig {
            base_url: format!("{base}/v1"),
            max_retries,
            ..EmbeddingConfig::default()
        };
        let embedder = OpenAiEmbedder::new("sk-test", &config, Duration::from_secs(5)).unwrap();
        (embedder, hits)
    }

    fn pair() -> Vec<String> {
        vec!["first".to_string(), "second".to_string()]
    }

    #[tokio::test]
    async fn server_errors_are_retried_until_the_limit() {
        let (embedder, hits) = embedder(StatusCode::SERVICE_UNAVAILABLE, usize::MAX, 2).await;

        let err = embedder.embed(&pair()).await.unwrap_err();

        assert!(matches!(err, EmbedError::Status { status: 503, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limit_recovers_on_retry() {
        let (embedder, hits) = embedder(StatusCode::TOO_MANY_REQUESTS, 1, 2).await;

        let vectors = embedder.embed(&pair()).await.unwrap();

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unauthorized_is_not_retried() {
        let (embedder, hits) = embedder(StatusCode::UNAUTHORIZED, usize::MAX, 3).await;

        let err = embedder.embed(&pair()).await.unwrap_err();

        assert!(matches!(err, EmbedError::Status { status: 401, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn short_response_is_a_count_mismatch() {
        let (embedder, hits) = embedder(StatusCode::OK, 0, 2).await;

        let err = embedder
            .embed(&["one".to_string(), "two".to_string(), "three".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EmbedError::CountMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn request_omits_dimensions_when_unset() {
        let inputs = vec!["hello".to_string()];
        let request = EmbeddingRequest {
            model: "text-embedding-3-large",
            input: &inputs,
            dimensions: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "text-embedding-3-large");
        assert_eq!(json["input"][0], "hello");
        assert!(json.get("dimensions").is_none());
    }

    #[test]
    fn response_entries_are_sorted_by_index() {
        let mut parsed: EmbeddingResponse = serde_json::from_str(
            r#"{"data":[{"embedding":[2.0],"index":1},{"embedding":[1.0],"index":0}]}"#,
        )
        .unwrap();
        parsed.data.sort_by_key(|entry| entry.index);
        assert_eq!(parsed.data[0].embedding, vec![1.0]);
        assert_eq!(parsed.data[1].embedding, vec![2.0]);
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected_without_a_request() {
        let config = EmbeddingConfig {
            batch_size: 1,
            base_url: "http://127.0.0.1:9".to_string(),
            ..EmbeddingConfig::default()
        };
        let embedder = OpenAiEmbedder::new("sk-test", &config, Duration::from_secs(1)).unwrap();
        let err = embedder
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedError::BatchTooLarge { size: 2, max: 1 }));
    }
}
