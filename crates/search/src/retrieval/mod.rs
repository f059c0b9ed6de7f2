//! Multi-modal retrieval system
//!
//! Provides two retrieval modes per query:
//! - Vector search (semantic similarity via embeddings)
//! - Hybrid search (RRF fusion of vector + BM25)
//!
//! plus the cross-query merge and parent promotion applied after them.

mod bm25;
mod fusion;
mod hybrid;
mod merge;
mod vector;

pub use bm25::{tokenize, BM25Params, LexicalHit, LexicalIndex};
pub use fusion::{normalize_scores, RrfFusion};
pub use hybrid::HybridRetriever;
pub use merge::{merge_results, promote_parents};
pub use vector::VectorRetriever;

use ragforge_common::errors::Result;
use ragforge_common::models::{Filters, RankedHit};
use serde::{Deserialize, Serialize};

/// Retrieval mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Vector similarity search
    Vector,
    /// Vector search fused with BM25
    Hybrid,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Vector => "vector",
            RetrievalMode::Hybrid => "hybrid",
        }
    }
}

/// Common trait for all retrievers
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve up to `top_k` hits for one query
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filters: Option<&Filters>,
    ) -> Result<Vec<RankedHit>>;

    /// Get the retrieval mode
    fn mode(&self) -> RetrievalMode;
}

/// Set `rank` to 1..N in list order
pub fn assign_ranks(hits: &mut [RankedHit]) {
    for (i, hit) in hits.iter_mut().enumerate() {
        hit.rank = Some(i + 1);
    }
}
