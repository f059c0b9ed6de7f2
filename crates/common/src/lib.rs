//! RagForge Common Library
//!
//! Shared code for the ingestion and search crates including:
//! - Document and query models
//! - Embedding client abstraction
//! - Generation (chat model) abstraction
//! - Vector store abstraction with memory, Qdrant and Milvus backends
//! - Error types and handling
//! - Configuration management
//! - Metrics and tracing setup

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod generation;
pub mod metrics;
pub mod models;
pub mod telemetry;
pub mod vectorstore;

// Re-export commonly used types
pub use config::RagConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use generation::GenerationProvider;
pub use models::{Document, RankedHit};
pub use vectorstore::VectorStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
