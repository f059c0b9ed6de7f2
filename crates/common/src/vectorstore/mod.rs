//! Vector store abstraction
//!
//! One trait, several backends chosen at construction time from
//! [`VectorStoreConfig::backend`]:
//! - `memory`: brute-force cosine search in process memory
//! - `qdrant`: Qdrant REST API
//! - `milvus`: Milvus v2 REST API
//!
//! Every call returns a `Result`; callers decide whether a failure is fatal
//! (indexing) or degrades to "no hits" (search).

mod memory;
mod milvus;
mod qdrant;

pub use memory::InMemoryVectorStore;
pub use milvus::MilvusVectorStore;
pub use qdrant::QdrantVectorStore;

use crate::config::{VectorBackend, VectorStoreConfig};
use crate::errors::{AppError, Result};
use crate::models::{Document, Filters, RankedHit};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Collection statistics reported by a backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub name: String,
    pub backend: String,
    pub num_entities: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Persists document vectors and answers nearest-neighbour queries
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name used in logs and errors
    fn backend(&self) -> &'static str;

    /// (Re)create the collection for vectors of `dimension`; an existing
    /// collection with the same name is dropped first
    async fn create_collection(&self, dimension: usize) -> Result<()>;

    /// Insert or overwrite documents; every document must carry a vector
    async fn batch_upsert(&self, documents: &[Document]) -> Result<()>;

    /// Nearest neighbours by descending similarity
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filters: Option<&Filters>,
    ) -> Result<Vec<RankedHit>>;

    /// Remove documents by id; unknown ids are ignored
    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Collection statistics
    async fn stats(&self) -> Result<CollectionStats>;

    /// Remove the collection entirely
    async fn drop_collection(&self) -> Result<()>;
}

/// Create a vector store based on configuration
pub fn create_vector_store(config: &VectorStoreConfig) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.backend {
        VectorBackend::Memory => Arc::new(InMemoryVectorStore::new(&config.collection_name)),
        VectorBackend::Qdrant => Arc::new(QdrantVectorStore::new(config)?),
        VectorBackend::Milvus => Arc::new(MilvusVectorStore::new(config)?),
    };
    tracing::info!(
        backend = store.backend(),
        collection = %config.collection_name,
        "Vector store created"
    );
    Ok(store)
}

/// Vector of a document about to be upserted
pub(crate) fn require_vector<'a>(backend: &str, document: &'a Document) -> Result<&'a [f32]> {
    document.vector.as_deref().ok_or_else(|| {
        AppError::backend(
            backend,
            format!("document {} has no vector; embed before upserting", document.id),
        )
    })
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AppError::Internal {
            message: format!("Failed to create HTTP client: {}", e),
        })
}
