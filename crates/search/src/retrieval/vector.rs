//! Vector similarity search through the configured vector store

use super::{RetrievalMode, Retriever};
use ragforge_common::embeddings::Embedder;
use ragforge_common::errors::Result;
use ragforge_common::models::{Filters, RankedHit};
use ragforge_common::vectorstore::VectorStore;
use std::sync::Arc;
use tracing::instrument;

/// Embeds the query and asks the vector store for nearest neighbours
#[derive(Clone)]
pub struct VectorRetriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl VectorRetriever {
    /// Create a new vector retriever
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }
}

#[async_trait::async_trait]
impl Retriever for VectorRetriever {
    #[instrument(skip(self, query, filters), fields(backend = self.store.backend()))]
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filters: Option<&Filters>,
    ) -> Result<Vec<RankedHit>> {
        let embedding = self.embedder.embed(query).await?;
        self.store.search(&embedding, top_k, filters).await
    }

    fn mode(&self) -> RetrievalMode {
        RetrievalMode::Vector
    }
}
