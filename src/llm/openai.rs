//! OpenAI-compatible chat completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::provider::{AnswerGenerator, ProviderError};
use super::types::{ChatMessage, GenerationRequest};
use crate::core::config::GenerationConfig;
use crate::core::retry::{backoff_delay, is_retryable_error, is_retryable_status};

#[derive(Clone)]
pub struct OpenAiGenerator {
    client: Client,
    endpoint: String,
    model: String,
    max_retries: u32,
}

impl OpenAiGenerator {
    pub fn new(
        api_key: &str,
        config: &GenerationConfig,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| ProviderError::Http("invalid OpenAI API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| ProviderError::Http(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn send_once(&self, body: &CompletionRequest<'_>) -> Result<String, Attempt> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                let retryable = is_retryable_error(&err);
                let error = if err.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Http(err.to_string())
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
                error: ProviderError::Status {
                    status: status.as_u16(),
                    body,
                },
                retryable: is_retryable_status(status),
            });
        }

        let parsed: CompletionResponse = resp.json().await.map_err(|err| Attempt {
            error: ProviderError::Decode(err.to_string()),
            retryable: false,
        })?;
        parsed.into_content().map_err(|error| Attempt {
            error,
            retryable: false,
        })
    }
}

struct Attempt {
    error: ProviderError,
    retryable: bool,
}

#[async_trait]
impl AnswerGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, ProviderError> {
        let body = CompletionRequest {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let mut attempt = 0u32;
        loop {
            match self.send_once(&body).await {
                Ok(content) => return Ok(content),
                Err(failed) if failed.retryable && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "chat completion failed, retrying: {}",
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
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    fn into_content(self) -> Result<String, ProviderError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ProviderError::EmptyResponse)
    }
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

    async fn completions(State(upstream): State<Upstream>) -> Response {
        let seen = upstream.hits.fetch_add(1, Ordering::SeqCst);
        if seen < upstream.failures {
            return (upstream.status, r#"{"error":{"message":"nope"}}"#).into_response();
        }
        Json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "Paris." } }]
        }))
        .into_response()
    }

    async fn generator(
        status: StatusCode,
        failures: usize,
        max_retries: u32,
    ) -> (OpenAiGenerator, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/v1/chat/completions", post(completions))
            .with_state(Upstream {
                hits: hits.clone(),
                failures,
                status,
            });
        let base = testing::serve(app).await;
        let config = GenerationConfig {
            base_url: format!("{base}/v1"),
            max_retries,
            ..GenerationConfig::default()
        };
        let generator = OpenAiGenerator::new("sk-test", &config, Duration::from_secs(5)).unwrap();
        (generator, hits)
    }

    fn question() -> GenerationRequest {
        GenerationRequest::new(
            vec![ChatMessage::system("ctx"), ChatMessage::user("capital?")],
            100,
            0.0,
        )
    }

    #[tokio::test]
    async fn rate_limits_are_retried_until_the_limit() {
        let (generator, hits) = generator(StatusCode::TOO_MANY_REQUESTS, usize::MAX, 1).await;

        let err = generator.generate(question()).await.unwrap_err();

        assert!(matches!(err, ProviderError::Status { status: 429, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn server_error_recovers_on_retry() {
        let (generator, hits) = generator(StatusCode::BAD_GATEWAY, 2, 2).await;

        let answer = generator.generate(question()).await.unwrap();

        assert_eq!(answer, "Paris.");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unauthorized_is_not_retried() {
        let (generator, hits) = generator(StatusCode::UNAUTHORIZED, usize::MAX, 2).await;

        let err = generator.generate(question()).await.unwrap_err();

        assert!(matches!(err, ProviderError::Status { status: 401, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn request_body_carries_sampling_settings() {
        let messages = vec![ChatMessage::system("ctx"), ChatMessage::user("hi")];
        let body = CompletionRequest {
            model: "gpt-4",
            messages: &messages,
            max_tokens: 1000,
            temperature: 0.5,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["max_tokens"], 1000);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn first_choice_content_is_returned_verbatim() {
        let parsed: CompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  Paris.\n"}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.into_content().unwrap(), "  Paris.\n");
    }

    #[test]
    fn missing_content_is_an_error() {
        let parsed: CompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
                .unwrap();
        assert!(matches!(
            parsed.into_content(),
            Err(ProviderError::EmptyResponse)
        ));

        let empty: CompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            empty.into_content(),
            Err(ProviderError::EmptyResponse)
        ));
    }

    #[test]
    fn endpoint_is_built_from_base_url() {
        let config = GenerationConfig {
            base_url: "https://api.openai.com/v1/".to_string(),
            ..GenerationConfig::default()
        };
        let generator = OpenAiGenerator::new("sk-test", &config, Duration::from_secs(5)).unwrap();
        assert_eq!(
            generator.endpoint,
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(generator.name(), "gpt-4");
    }
}
