//! Milvus v2 REST adapter
//!
//! Collections use a fixed schema: `id` (VarChar primary key), `text`
//! (VarChar), `metadata` (JSON) and `vector` (FloatVector, COSINE index).

use super::{http_client, require_vector, CollectionStats, VectorStore};
use crate::config::VectorStoreConfig;
use crate::errors::{AppError, Result};
use crate::models::{Document, Filters, Metadata, MetadataValue, RankedHit};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

const BACKEND: &str = "milvus";
const MAX_ID_LENGTH: usize = 512;
const MAX_TEXT_LENGTH: usize = 65535;

/// Milvus-backed [`VectorStore`]
pub struct MilvusVectorStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct MilvusResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct SearchRow {
    id: String,
    distance: f32,
    #[serde(default)]
    text: String,
    #[serde(default)]
    metadata: Metadata,
}

fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

/// Milvus boolean expression for equality on every metadata key
pub fn filter_expression(filters: &Filters) -> String {
    filters
        .iter()
        .map(|(key, value)| {
            let literal = match value {
                MetadataValue::Bool(b) => b.to_string(),
                MetadataValue::Integer(i) => i.to_string(),
                MetadataValue::Float(f) => f.to_string(),
                MetadataValue::String(s) => quote(s),
            };
            format!("metadata[{}] == {}", quote(key), literal)
        })
        .collect::<Vec<_>>()
        .join(" and ")
}

fn id_expression(ids: &[String]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| quote(id)).collect();
    format!("id in [{}]", quoted.join(", "))
}

fn collection_schema(name: &str, dimension: usize) -> Value {
    json!({
        "collectionName": name,
        "schema": {
            "autoId": false,
            "enableDynamicField": false,
            "fields": [
                { "fieldName": "id", "dataType": "VarChar", "isPrimary": true,
                  "elementTypeParams": { "max_length": MAX_ID_LENGTH.to_string() } },
                { "fieldName": "text", "dataType": "VarChar",
                  "elementTypeParams": { "max_length": MAX_TEXT_LENGTH.to_string() } },
                { "fieldName": "metadata", "dataType": "JSON" },
                { "fieldName": "vector", "dataType": "FloatVector",
                  "elementTypeParams": { "dim": dimension.to_string() } },
            ],
        },
        "indexParams": [
            { "fieldName": "vector", "indexName": "vector", "metricType": "COSINE", "indexType": "AUTOINDEX" },
        ],
    })
}

impl MilvusVectorStore {
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection_name.clone(),
            token: config.api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v2/vectordb/{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let mut builder = self.client.post(self.endpoint(path)).json(&body);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AppError::backend(BACKEND, format!("request failed: {}", e)))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::backend(BACKEND, format!("HTTP {}: {}", status, body)));
        }

        let parsed: MilvusResponse = response
            .json()
            .await
            .map_err(|e| AppError::backend(BACKEND, format!("invalid response: {}", e)))?;
        if parsed.code != 0 {
            return Err(AppError::backend(
                BACKEND,
                format!(
                    "code {}: {}",
                    parsed.code,
                    parsed.message.unwrap_or_default()
                ),
            ));
        }
        Ok(parsed.data)
    }
}

#[async_trait]
impl VectorStore for MilvusVectorStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    #[instrument(skip(self), fields(collection = %self.collection))]
    async fn create_collection(&self, dimension: usize) -> Result<()> {
        // Drop fails when the collection does not exist yet
        let _ = self
            .post("collections/drop", json!({ "collectionName": self.collection }))
            .await;
        self.post("collections/create", collection_schema(&self.collection, dimension))
            .await?;
        debug!("Created Milvus collection");
        Ok(())
    }

    #[instrument(skip(self, documents), fields(collection = %self.collection, count = documents.len()))]
    async fn batch_upsert(&self, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let rows = documents
            .iter()
            .map(|doc| {
                let vector = require_vector(BACKEND, doc)?;
                Ok(json!({
                    "id": doc.id,
                    "text": doc.text,
                    "metadata": doc.metadata,
                    "vector": vector,
                }))
            })
            .collect::<Result<Vec<Value>>>()?;

        self.post(
            "entities/upsert",
            json!({ "collectionName": self.collection, "data": rows }),
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
            "collectionName": self.collection,
            "data": [query_vector],
            "annsField": "vector",
            "limit": top_k,
            "outputFields": ["id", "text", "metadata"],
        });
        if let Some(filters) = filters.filter(|f| !f.is_empty()) {
            body["filter"] = Value::String(filter_expression(filters));
        }

        let data = self.post("entities/search", body).await?;
        let rows: Vec<SearchRow> = serde_json::from_value(data)
            .map_err(|e| AppError::backend(BACKEND, format!("invalid search rows: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let document = Document {
                    id: row.id,
                    text: row.text,
                    vector: None,
                    metadata: row.metadata,
                };
                RankedHit::new(document, row.distance)
            })
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.post(
            "entities/delete",
            json!({ "collectionName": self.collection, "filter": id_expression(ids) }),
        )
        .await?;
        Ok(())
    }

    async fn stats(&self) -> Result<CollectionStats> {
        let data = self
            .post("collections/get_stats", json!({ "collectionName": self.collection }))
            .await?;
        let num_entities = data
            .get("rowCount")
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(0) as usize;

        Ok(CollectionStats {
            name: self.collection.clone(),
            backend: BACKEND.to_string(),
            num_entities,
            dimension: None,
            status: None,
        })
    }

    async fn drop_collection(&self) -> Result<()> {
        self.post("collections/drop", json!({ "collectionName": self.collection }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_expression_quotes_strings() {
        let mut filters = Filters::new();
        filters.insert("category".into(), "tech".into());
        filters.insert("year".into(), 2024i64.into());
        assert_eq!(
            filter_expression(&filters),
            r#"metadata["category"] == "tech" and metadata["year"] == 2024"#
        );
    }

    #[test]
    fn test_id_expression_escapes_quotes() {
        let ids = vec!["a".to_string(), "b\"c".to_string()];
        assert_eq!(id_expression(&ids), r#"id in ["a", "b\"c"]"#);
    }

    #[test]
    fn test_schema_carries_dimension() {
        let schema = collection_schema("docs", 384);
        assert_eq!(schema["schema"]["fields"][3]["elementTypeParams"]["dim"], "384");
        assert_eq!(schema["indexParams"][0]["metricType"], "COSINE");
    }
}
