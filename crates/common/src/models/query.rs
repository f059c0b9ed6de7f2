//! Query requests and responses

use super::document::{Filters, RankedHit};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Caller-facing query request for the answer pipeline
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QueryConfiguration {
    /// Query text
    #[validate(length(min = 1))]
    pub query: String,

    /// Maximum results to return
    #[validate(range(min = 1))]
    pub top_k: usize,

    /// Metadata equality filters passed to the vector store
    #[serde(default)]
    pub filters: Option<Filters>,

    /// Fuse lexical and vector results
    #[serde(default = "default_true")]
    pub enable_hybrid: bool,

    /// Re-score results with the generation provider
    #[serde(default = "default_true")]
    pub enable_rerank: bool,
}

fn default_true() -> bool {
    true
}

impl QueryConfiguration {
    pub fn new(query: impl Into<String>, top_k: usize) -> Self {
        Self {
            query: query.into(),
            top_k,
            filters: None,
            enable_hybrid: true,
            enable_rerank: true,
        }
    }
}

/// Knobs for the search pipeline
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchOptions {
    #[validate(range(min = 1))]
    pub top_k: usize,
    pub filters: Option<Filters>,
    pub enable_hybrid: bool,
    /// Paraphrase the query with the generation provider
    pub enable_multi_query: bool,
    /// Append a generated hypothetical passage as an extra query
    pub enable_hyde: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 20,
            filters: None,
            enable_hybrid: true,
            enable_multi_query: false,
            enable_hyde: false,
        }
    }
}

impl SearchOptions {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn hybrid(mut self, enabled: bool) -> Self {
        self.enable_hybrid = enabled;
        self
    }
}

impl From<&QueryConfiguration> for SearchOptions {
    fn from(request: &QueryConfiguration) -> Self {
        Self {
            top_k: request.top_k,
            filters: request.filters.clone(),
            enable_hybrid: request.enable_hybrid,
            enable_multi_query: false,
            enable_hyde: false,
        }
    }
}

/// Result of the answer pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub results: Vec<RankedHit>,
    /// Synthesized answer; empty when not requested or unavailable
    pub answer: String,
    pub num_results: usize,
}
