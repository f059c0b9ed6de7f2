//! Qdrant REST adapter
//!
//! Document ids are arbitrary strings while Qdrant point ids must be
//! unsigned integers or UUIDs, so each point id is derived from the SHA-256
//! of the document id and the original id travels in the payload.

use super::{http_client, require_vector, CollectionStats, VectorStore};
use crate::config::VectorStoreConfig;
use crate::errors::{AppError, Result};
use crate::models::{Document, Filters, Metadata, RankedHit};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};
use uuid::Uuid;

const BACKEND: &str = "qdrant";

/// Qdrant-backed [`VectorStore`]
pub struct QdrantVectorStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct QdrantResponse<T> {
    result: Option<T>,
    #[serde(default)]
    status: Value,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<Payload>,
}

#[derive(Deserialize)]
struct Payload {
    doc_id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Deserialize)]
struct CollectionInfo {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    points_count: Option<usize>,
    #[serde(default)]
    config: Option<Value>,
}

/// Stable point id for a document id
pub fn point_id(doc_id: &str) -> Uuid {
    let digest = Sha256::digest(doc_id.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

fn filter_body(filters: &Filters) -> Value {
    let must: Vec<Value> = filters
        .iter()
        .map(|(key, value)| json!({ "key": format!("metadata.{}", key), "match": { "value": value } }))
        .collect();
    json!({ "must": must })
}

impl QdrantVectorStore {
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection_name.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, suffix)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<Option<T>> {
        let response = builder
            .send()
            .await
            .map_err(|e| AppError::backend(BACKEND, format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::backend(BACKEND, format!("HTTP {}: {}", status, body)));
        }

        let parsed: QdrantResponse<T> = response
            .json()
            .await
            .map_err(|e| AppError::backend(BACKEND, format!("invalid response: {}", e)))?;
        if let Some(error) = parsed.status.get("error") {
            return Err(AppError::backend(BACKEND, error.to_string()));
        }
        Ok(parsed.result)
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    #[instrument(skip(self), fields(collection = %self.collection))]
    async fn create_collection(&self, dimension: usize) -> Result<()> {
        // Missing collection on delete is fine
        let _ = self
            .request(reqwest::Method::DELETE, self.collection_url(""))
            .send()
            .await;

        let body = json!({ "vectors": { "size": dimension, "distance": "Cosine" } });
        self.send::<Value>(self.request(reqwest::Method::PUT, self.collection_url("")).json(&body))
            .await?;
        debug!("Created Qdrant collection");
        Ok(())
    }

    #[instrument(skip(self, documents), fields(collection = %self.collection, count = documents.len()))]
    async fn batch_upsert(&self, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let points = documents
            .iter()
            .map(|doc| {
                let vector = require_vector(BACKEND, doc)?;
                Ok(json!({
                    "id": point_id(&doc.id).to_string(),
                    "vector": vector,
                    "payload": { "doc_id": doc.id, "text": doc.text, "metadata": doc.metadata },
                }))
            })
            .collect::<Result<Vec<Value>>>()?;

        self.send::<Value>(
            self.request(reqwest::Method::PUT, self.collection_url("/points?wait=true"))
                .json(&json!({ "points": points })),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, query_vector, filters), fields(collection = %self.collection))]
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filters: Option<&Filters>,
    ) -> Result<Vec<RankedHit>> {
        let mut body = json!({
            "vector": query_vector,
            "limit": top_k,
            "with_payload": true,
        });
        if let Some(filters) = filters.filter(|f| !f.is_empty()) {
            body["filter"] = filter_body(filters);
        }

        let points: Vec<ScoredPoint> = self
            .send(
                self.request(reqwest::Method::POST, self.collection_url("/points/search"))
                    .json(&body),
            )
            .await?
            .unwrap_or_default();

        Ok(points
            .into_iter()
            .filter_map(|point| {
                let payload = point.payload?;
                let document = Document {
                    id: payload.doc_id,
                    text: payload.text,
                    vector: None,
                    metadata: payload.metadata,
                };
                Some(RankedHit::new(document, point.score))
            })
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let points: Vec<String> = ids.iter().map(|id| point_id(id).to_string()).collect();
        self.send::<Value>(
            self.request(reqwest::Method::POST, self.collection_url("/points/delete?wait=true"))
                .json(&json!({ "points": points })),
        )
        .await?;
        Ok(())
    }

    async fn stats(&self) -> Result<CollectionStats> {
        let info: Option<CollectionInfo> = self
            .send(self.request(reqwest::Method::GET, self.collection_url("")))
            .await?;
        let info = info.ok_or_else(|| AppError::backend(BACKEND, "collection info missing"))?;

        let dimension = info
            .config
            .as_ref()
            .and_then(|c| c.pointer("/params/vectors/size"))
            .and_then(Value::as_u64)
            .map(|d| d as usize);

        Ok(CollectionStats {
            name: self.collection.clone(),
            backend: BACKEND.to_string(),
            num_entities: info.points_count.unwrap_or(0),
            dimension,
            status: info.status,
        })
    }

    async fn drop_collection(&self) -> Result<()> {
        self.send::<Value>(self.request(reqwest::Method::DELETE, self.collection_url("")))
            .await?;
        Ok(())
    }
}
