//! RagForge Ingestion
//!
//! Turns raw document text into indexable units:
//! - Fixed character windows with overlap
//! - Parent-child chunking, where small children are indexed and their
//!   enclosing parent window is returned at query time

pub mod chunker;
pub mod errors;

pub use chunker::{make_parent_child_documents, parent_child_chunk, simple_chunk};
pub use errors::ChunkingError;
pub use ragforge_common::config::ChunkingConfig;
