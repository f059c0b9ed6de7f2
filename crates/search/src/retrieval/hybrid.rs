//! Hybrid retrieval combining vector and BM25 search
//!
//! Uses RRF fusion to combine results from both retrievers

use super::{
    bm25::LexicalIndex, fusion::RrfFusion, vector::VectorRetriever, RetrievalMode, Retriever,
};
use ragforge_common::errors::Result;
use ragforge_common::metrics;
use ragforge_common::models::{Filters, RankedHit};
use std::sync::Arc;
use tracing::{instrument, warn};

/// Hybrid retriever over one lexical index generation
pub struct HybridRetriever {
    vector: VectorRetriever,
    lexical: Arc<LexicalIndex>,
    fusion: RrfFusion,
}

impl HybridRetriever {
    /// Create a new hybrid retriever
    pub fn new(vector: VectorRetriever, lexical: Arc<LexicalIndex>, fusion: RrfFusion) -> Self {
        Self {
            vector,
            lexical,
            fusion,
        }
    }

    /// Lexical matches as full results, used when the vector stage failed.
    /// Documents sharing no term with the query are left out. Scores are
    /// RRF contributions so they merge with other variants' fused results.
    fn lexical_only(&self, query: &str, top_k: usize, filters: Option<&Filters>) -> Vec<RankedHit> {
        let hits: Vec<RankedHit> = self
            .lexical
            .search_documents(query, top_k, filters)
            .into_iter()
            .filter(|h| h.score > 0.0)
            .collect();
        self.fusion.fuse_lexical_only(hits)
    }
}

#[async_trait::async_trait]
impl Retriever for HybridRetriever {
    #[instrument(skip(self, query, filters), fields(lexical_docs = self.lexical.len()))]
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filters: Option<&Filters>,
    ) -> Result<Vec<RankedHit>> {
        let vector_results = self.vector.retrieve(query, top_k, filters).await;

        match vector_results {
            Ok(vector_hits) => {
                let lexical_hits = self.lexical.search(query, top_k);
                Ok(self.fusion.fuse(vector_hits, &lexical_hits))
            }
            Err(e) => {
                warn!(
                    error = %e,
                    degradable = e.is_degradable(),
                    "Vector stage failed, falling back to lexical matches"
                );
                metrics::record_backend_failure("vector");
                Ok(self.lexical_only(query, top_k, filters))
            }
        }
    }

    fn mode(&self) -> RetrievalMode {
        RetrievalMode::Hybrid
    }
}
