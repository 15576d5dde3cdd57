//! Qdrant REST client.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::math::rank_by_score;
use super::{EntryPayload, IndexEntry, IndexError, ScoredEntry, VectorIndex};
use crate::core::config::VectorIndexConfig;

/// Extra hits requested beyond `limit` so equal scores at the cut can be
/// re-ranked by `seq` locally.
const TIE_MARGIN: usize = 8;

pub struct QdrantIndex {
    client: Client,
    base_url: String,
    collection: String,
    /// Known collection dimension, 0 until the first successful check.
    dimension: AtomicUsize,
}

impl QdrantIndex {
    pub fn new(config: &VectorIndexConfig, timeout: Duration) -> Result<Self, IndexError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            headers.insert(
                "api-key",
                HeaderValue::from_str(key.trim())
                    .map_err(|_| IndexError::Http("invalid Qdrant API key".to_string()))?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| IndexError::Http(format!("failed to build Qdrant HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection_name.clone(),
            dimension: AtomicUsize::new(0),
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, suffix)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, IndexError> {
        let resp = request
            .send()
            .await
            .map_err(|err| IndexError::Http(err.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(IndexError::Status {
                status: status.as_u16(),
                body,
            });
        }
        resp.json()
            .await
            .map_err(|err| IndexError::Decode(err.to_string()))
    }

    /// Vector size of the existing collection, or `None` when it does not exist.
    async fn existing_dimension(&self) -> Result<Option<usize>, IndexError> {
        let resp = self
            .client
            .get(self.collection_url(""))
            .send()
            .await
            .map_err(|err| IndexError::Http(err.to_string()))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(IndexError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let info: CollectionInfo = resp
            .json()
            .await
            .map_err(|err| IndexError::Decode(err.to_string()))?;
        Ok(Some(info.result.config.params.vectors.size))
    }

    fn check_dimension(&self, actual: usize) -> Result<(), IndexError> {
        match self.dimension.load(Ordering::Acquire) {
            0 => Err(IndexError::MissingCollection),
            expected if expected != actual => {
                Err(IndexError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    fn corpus_filter(corpus_ids: &[Uuid]) -> Value {
        let ids: Vec<String> = corpus_ids.iter().map(Uuid::to_string).collect();
        json!({ "must": [{ "key": "corpus_id", "match": { "any": ids } }] })
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn ensure_collection(&self, dimension: usize) -> Result<(), IndexError> {
        match self.existing_dimension().await? {
            Some(expected) if expected != dimension => {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: dimension,
                });
            }
            Some(_) => {}
            None => {
                tracing::info!(
                    collection = %self.collection,
                    dimension,
                    "creating Qdrant collection"
                );
                self.send(
                    self.client
                        .put(self.collection_url(""))
                        .json(&json!({ "vectors": { "size": dimension, "distance": "Cosine" } })),
                )
                .await?;
                self.send(
                    self.client
                        .put(self.collection_url("/index"))
                        .json(&json!({ "field_name": "corpus_id", "field_schema": "keyword" })),
                )
                .await?;
            }
        }
        self.dimension.store(dimension, Ordering::Release);
        Ok(())
    }

    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<(), IndexError> {
        if entries.is_empty() {
            return Ok(());
        }
        for entry in &entries {
            self.check_dimension(entry.vector.len())?;
        }
        let points: Vec<PointStruct> = entries
            .into_iter()
            .map(|entry| PointStruct {
                id: entry.id,
                vector: entry.vector,
                payload: entry.payload,
            })
            .collect();
        self.send(
            self.client
                .put(self.collection_url("/points?wait=true"))
                .json(&json!({ "points": points })),
        )
        .await?;
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        corpus_ids: &[Uuid],
    ) -> Result<Vec<ScoredEntry>, IndexError> {
        if corpus_ids.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let request = SearchRequest {
            vector,
            limit: limit.saturating_add(TIE_MARGIN),
            with_payload: true,
            filter: Self::corpus_filter(corpus_ids),
        };
        let value = self
            .send(
                self.client
                    .post(self.collection_url("/points/search"))
                    .json(&request),
            )
            .await?;
        let parsed: SearchResponse =
            serde_json::from_value(value).map_err(|err| IndexError::Decode(err.to_string()))?;

        let mut hits: Vec<ScoredEntry> = parsed
            .result
            .into_iter()
            .map(|point| ScoredEntry {
                score: point.score,
                payload: point.payload,
            })
            .collect();
        // Qdrant leaves equal scores in unspecified order.
        rank_by_score(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_corpus(&self, corpus_ids: &[Uuid]) -> Result<(), IndexError> {
        if corpus_ids.is_empty() {
            return Ok(());
        }
        let result = self
            .send(
                self.client
                    .post(self.collection_url("/points/delete?wait=true"))
                    .json(&json!({ "filter": Self::corpus_filter(corpus_ids) })),
            )
            .await;
        match result {
            Err(IndexError::Status { status: 404, .. }) => Ok(()),
            other => other.map(|_| ()),
        }
    }

    async fn count(&self) -> Result<usize, IndexError> {
        let result = self
            .send(
                self.client
                    .post(self.collection_url("/points/count"))
                    .json(&json!({ "exact": true })),
            )
            .await;
        let value = match result {
            Err(IndexError::Status { status: 404, .. }) => return Ok(0),
            other => other?,
        };
        let parsed: CountResponse =
            serde_json::from_value(value).map_err(|err| IndexError::Decode(err.to_string()))?;
        Ok(parsed.result.count)
    }
}

#[derive(Serialize)]
struct PointStruct {
    id: Uuid,
    vector: Vec<f32>,
    payload: EntryPayload,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
    filter: Value,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    score: f32,
    payload: EntryPayload,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    result: CountResult,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    result: CollectionResult,
}

#[derive(Debug, Deserialize)]
struct CollectionResult {
    config: CollectionConfig,
}

#[derive(Debug, Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Debug, Deserialize)]
struct CollectionParams {
    vectors: VectorParams,
}

#[derive(Debug, Deserialize)]
struct VectorParams {
    size: usize,
}
