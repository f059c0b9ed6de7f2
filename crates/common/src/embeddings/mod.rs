//! Embedding service abstraction
//!
//! Provides a unified interface for embedding providers:
//! - OpenAI-compatible HTTP endpoints (text-embedding-3-small, ...)
//! - A deterministic feature-hashing embedder for offline use and tests

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// OpenAI embedding client
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct OpenAIRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder
    pub fn new(api_key: String, config: &EmbeddingConfig) -> Result<Self> {
        let dimension = match config.model.as_str() {
            "text-embedding-ada-002" => 1536,
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            _ => config.dimension,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            dimension,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            max_retries: config.max_retries.max(1),
        })
    }

    /// Make request with retry
    async fn request_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                // Exponential backoff
                let delay = Duration::from_millis(100 * (2_u64.pow(attempt)));
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();
            match self.make_request(texts).await {
                Ok(embeddings) => {
                    metrics::record_embedding(
                        start.elapsed().as_secs_f64(),
                        &self.model,
                        texts.len(),
                        true,
                    );
                    return Ok(embeddings);
                }
                Err(e) => {
                    metrics::record_embedding(
                        start.elapsed().as_secs_f64(),
                        &self.model,
                        texts.len(),
                        false,
                    );
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %e,
                        "Embedding request failed, retrying"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::EmbeddingError {
            message: "Unknown error after retries".to_string(),
        }))
    }

    async fn make_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);

        let request = OpenAIRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::EmbeddingError {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: OpenAIResponse = response.json().await.map_err(|e| AppError::EmbeddingError {
            message: format!("Failed to parse response: {}", e),
        })?;

        if result.data.len() != texts.len() {
            return Err(AppError::EmbeddingError {
                message: format!(
                    "Expected {} embeddings, received {}",
                    texts.len(),
                    result.data.len()
                ),
            });
        }

        Ok(result.data.into_iter().map(|e| e.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.request_with_retry(&[text.to_string()]).await?;
        embeddings.into_iter().next().ok_or_else(|| AppError::EmbeddingError {
            message: "Empty response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // OpenAI has a limit of 2048 texts per request
        const BATCH_SIZE: usize = 100;

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let embeddings = self.request_with_retry(chunk).await?;
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Feature-hashing embedder.
///
/// Each lower-cased word (and each non-Latin character) is hashed into one of
/// `dimension` signed buckets and the result is L2-normalized, so texts that
/// share words land close together under cosine similarity. Deterministic
/// across processes.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn features(text: &str) -> Vec<String> {
        let mut features = Vec::new();
        let mut word = String::new();
        for c in text.chars() {
            if c.is_ascii_alphanumeric() {
                word.push(c.to_ascii_lowercase());
                continue;
            }
            if !word.is_empty() {
                features.push(std::mem::take(&mut word));
            }
            if c.is_alphanumeric() {
                features.push(c.to_string());
            }
        }
        if !word.is_empty() {
            features.push(word);
        }
        features
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for feature in Self::features(text) {
            let digest = Sha256::digest(feature.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn model_name(&self) -> &str {
        "feature-hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => {
            let key = config
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| AppError::config("OpenAI API key required for embedding.provider = openai"))?;
            Ok(Arc::new(OpenAIEmbedder::new(key, config)?))
        }
        "hashing" => Ok(Arc::new(HashingEmbedder::new(config.dimension))),
        other => Err(AppError::config(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_hashing_embedder_dimension_and_norm() {
        let embedder = HashingEmbedder::new(768);
        let embedding = embedder.embed("test text").await.unwrap();
        assert_eq!(embedding.len(), 768);
        let norm: f32 = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hashing_embedder_is_deterministic() {
        let embedder = HashingEmbedder::new(256);
        let texts = vec!["text1".to_string(), "text1".to_string()];
        let embeddings = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0], embeddings[1]);
    }

    #[tokio::test]
    async fn test_shared_words_score_higher() {
        let embedder = HashingEmbedder::new(768);
        let query = embedder.embed("What is deep learning?").await.unwrap();
        let related = embedder
            .embed("Deep learning uses multi-layer neural networks.")
            .await
            .unwrap();
        let unrelated = embedder
            .embed("A vector database stores embeddings for similarity search.")
            .await
            .unwrap();
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        let embedding = embedder.embed("").await.unwrap();
        assert!(embedding.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_create_embedder_requires_key_for_openai() {
        let mut config = EmbeddingConfig::default();
        config.provider = "openai".into();
        assert!(matches!(
            create_embedder(&config),
            Err(AppError::Configuration { .. })
        ));

        config.provider = "hashing".into();
        config.dimension = 64;
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.dimension(), 64);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let mut config = EmbeddingConfig::default();
        config.provider = "nope".into();
        assert!(create_embedder(&config).is_err());
    }
}
