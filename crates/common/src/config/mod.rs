//! Configuration management for ragforge
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with RAG__)
//! - Configuration files (config/default, config/{RAG_ENV}, config/local)
//! - Default values
//!
//! The loaded [`RagConfig`] is an explicit value handed to the orchestrator;
//! nothing here is process-global.

use crate::errors::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Main configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RagConfig {
    /// Retrieval and fusion parameters
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Document chunking
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Embedding provider
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Generation (chat completion) provider
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Vector store backend
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// How a new indexing call treats the existing child -> parent map
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentMapPolicy {
    /// Insert new entries, overwriting colliding child ids
    #[default]
    Merge,
    /// Discard the previous map before inserting
    Replace,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RetrievalConfig {
    /// Default number of results for search
    #[serde(default = "default_top_k")]
    #[validate(range(min = 1))]
    pub top_k: usize,

    /// Results kept after reranking and used as answer context
    #[serde(default = "default_final_top_k")]
    #[validate(range(min = 1))]
    pub final_top_k: usize,

    /// RRF rank-decay constant
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    /// Vector share of the fused score; lexical share is 1 - weight
    #[serde(default = "default_vector_weight")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub vector_weight: f32,

    /// Number of query variants (original included) for multi-query expansion
    #[serde(default = "default_multi_query_count")]
    #[validate(range(min = 1))]
    pub multi_query_count: usize,

    /// Characters of each document shown to the relevance scorer
    #[serde(default = "default_rerank_snippet_chars")]
    pub rerank_snippet_chars: usize,

    #[serde(default)]
    pub parent_map_policy: ParentMapPolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    /// Index child chunks and return their parent windows
    #[serde(default)]
    pub enable_parent_child: bool,

    /// Child chunk size in characters
    #[serde(default = "default_child_size")]
    pub child_size: usize,

    /// Overlap between consecutive child chunks in characters
    #[serde(default = "default_child_overlap")]
    pub child_overlap: usize,

    /// Parent window size in characters
    #[serde(default = "default_parent_size")]
    pub parent_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, hashing
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    #[validate(range(min = 1))]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,

    /// Documents per embedding request during indexing
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1))]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// API key; generation features are disabled without one
    pub api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,

    /// Chat model
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

/// Vector store backend selected at construction time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorBackend {
    /// Brute-force cosine search held in process memory
    #[default]
    Memory,
    /// Qdrant over its REST API
    Qdrant,
    /// Milvus over its v2 REST API
    Milvus,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub backend: VectorBackend,

    /// Backend URL (ignored by the memory backend)
    #[serde(default = "default_vector_store_url")]
    pub url: String,

    /// Backend API key / token
    pub api_key: Option<String>,

    /// Collection name
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Request timeout in seconds
    #[serde(default = "default_vector_store_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name attached to log lines
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_top_k() -> usize { 20 }
fn default_final_top_k() -> usize { 5 }
fn default_rrf_k() -> f32 { 60.0 }
fn default_vector_weight() -> f32 { 0.6 }
fn default_multi_query_count() -> usize { 3 }
fn default_rerank_snippet_chars() -> usize { 500 }
fn default_child_size() -> usize { 512 }
fn default_child_overlap() -> usize { 50 }
fn default_parent_size() -> usize { 2048 }
fn default_embedding_provider() -> String { "hashing".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dimension() -> usize { 768 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retries() -> u32 { 3 }
fn default_batch_size() -> usize { 32 }
fn default_generation_base_url() -> String { "https://api.deepseek.com".to_string() }
fn default_generation_model() -> String { "deepseek-chat".to_string() }
fn default_generation_timeout() -> u64 { 60 }
fn default_vector_store_url() -> String { "http://localhost:6333".to_string() }
fn default_collection_name() -> String { "rag_collection".to_string() }
fn default_vector_store_timeout() -> u64 { 30 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_service_name() -> String { "ragforge".to_string() }

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            final_top_k: default_final_top_k(),
            rrf_k: default_rrf_k(),
            vector_weight: default_vector_weight(),
            multi_query_count: default_multi_query_count(),
            rerank_snippet_chars: default_rerank_snippet_chars(),
            parent_map_policy: ParentMapPolicy::default(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            enable_parent_child: false,
            child_size: default_child_size(),
            child_overlap: default_child_overlap(),
            parent_size: default_parent_size(),
        }
    }
}

impl ChunkingConfig {
    /// Parent-child chunking with the given sizes
    pub fn parent_child(child_size: usize, child_overlap: usize, parent_size: usize) -> Self {
        Self {
            enable_parent_child: true,
            child_size,
            child_overlap,
            parent_size,
        }
    }

    /// Reject sizes that would stall the sliding window.
    ///
    /// Parents overlap by a full child, so the child size must be smaller
    /// than the parent size just as the child overlap must be smaller than
    /// the child size.
    pub fn validate(&self) -> Result<()> {
        if self.child_size == 0 {
            return Err(AppError::config("chunking.child_size must be positive"));
        }
        if self.child_overlap >= self.child_size {
            return Err(AppError::config(format!(
                "chunking.child_overlap ({}) must be smaller than chunking.child_size ({})",
                self.child_overlap, self.child_size
            )));
        }
        if self.child_size >= self.parent_size {
            return Err(AppError::config(format!(
                "chunking.child_size ({}) must be smaller than chunking.parent_size ({})",
                self.child_size, self.parent_size
            )));
        }
        Ok(())
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_generation_base_url(),
            model: default_generation_model(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl GenerationConfig {
    /// Whether a usable credential is configured
    pub fn has_credentials(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::default(),
            url: default_vector_store_url(),
            api_key: None,
            collection_name: default_collection_name(),
            timeout_secs: default_vector_store_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            service_name: default_service_name(),
        }
    }
}

impl RagConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let env = std::env::var("RAG_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with RAG__ prefix
            // e.g., RAG__RETRIEVAL__TOP_K=10
            .add_source(
                Environment::with_prefix("RAG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: RagConfig = config.try_deserialize()?;
        config.apply_env_fallbacks();
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("RAG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: RagConfig = config.try_deserialize()?;
        config.apply_env_fallbacks();
        config.validate()?;
        Ok(config)
    }

    /// Accept the conventional provider key variable when none is configured
    fn apply_env_fallbacks(&mut self) {
        if !self.generation.has_credentials() {
            self.generation.api_key = std::env::var("DEEPSEEK_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
    }

    /// Check cross-field constraints; every failure is a configuration error
    pub fn validate(&self) -> Result<()> {
        self.retrieval
            .validate()
            .map_err(|e| AppError::config(format!("retrieval: {}", e)))?;
        if !(self.retrieval.rrf_k.is_finite() && self.retrieval.rrf_k > 0.0) {
            return Err(AppError::config("retrieval.rrf_k must be a positive number"));
        }
        self.embedding
            .validate()
            .map_err(|e| AppError::config(format!("embedding: {}", e)))?;
        self.chunking.validate()
    }
}
