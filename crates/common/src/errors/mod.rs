//! Error types for ragforge
//!
//! Provides a single error enum shared by every crate with:
//! - Distinct variants for configuration, collaborator and backend failures
//! - Machine-readable error codes
//! - A degrade-vs-propagate classification used by the retrieval pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidFormat,

    // Collaborator errors (8xxx)
    CollaboratorUnavailable,
    BackendFailure,
    EmbeddingError,
    GenerationError,
    UpstreamError,
    ParseFailure,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidFormat => 1003,

            ErrorCode::CollaboratorUnavailable => 8001,
            ErrorCode::BackendFailure => 8002,
            ErrorCode::EmbeddingError => 8003,
            ErrorCode::GenerationError => 8004,
            ErrorCode::UpstreamError => 8005,
            ErrorCode::ParseFailure => 8006,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    /// Rejected parameters (chunk sizes, fusion weights, unknown backends).
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A collaborator cannot be used at all, e.g. no API key was configured.
    #[error("Collaborator unavailable: {collaborator}: {message}")]
    CollaboratorUnavailable { collaborator: String, message: String },

    /// A vector store or lexical index call failed.
    #[error("Backend failure ({backend}): {message}")]
    Backend { backend: String, message: String },

    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("Generation service error: {message}")]
    Generation { message: String },

    #[error("Parse failure: {message}")]
    Parse { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        AppError::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for a backend failure
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::CollaboratorUnavailable { .. } => ErrorCode::CollaboratorUnavailable,
            AppError::Backend { .. } => ErrorCode::BackendFailure,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::Generation { .. } => ErrorCode::GenerationError,
            AppError::Parse { .. } => ErrorCode::ParseFailure,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the search pipeline may swallow this error and continue with
    /// a degraded result. Configuration and validation errors never degrade.
    pub fn is_degradable(&self) -> bool {
        !matches!(
            self,
            AppError::Configuration { .. } | AppError::Validation { .. }
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
