//! RagForge Search
//!
//! Hybrid retrieval over a vector store and an in-memory BM25 index:
//! - Query expansion (multi-query, hypothetical passages)
//! - Vector and hybrid (RRF-fused) retrieval per query
//! - Cross-query merge and parent-window promotion
//! - LLM reranking and answer synthesis

pub mod engine;
pub mod expansion;
pub mod retrieval;

pub use engine::{IndexReport, OrchestratorStats, RetrievalOrchestrator};
pub use expansion::QueryExpander;
pub use retrieval::{LexicalHit, LexicalIndex, RetrievalMode, RrfFusion};
