//! Ingestion error types

use ragforge_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkingError {
    #[error("chunk size must be greater than zero")]
    ZeroSize,

    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

impl From<ChunkingError> for AppError {
    fn from(e: ChunkingError) -> Self {
        AppError::config(e.to_string())
    }
}
