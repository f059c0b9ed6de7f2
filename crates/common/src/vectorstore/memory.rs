//! In-process vector store with exact cosine search

use super::{require_vector, CollectionStats, VectorStore};
use crate::errors::{AppError, Result};
use crate::models::{sort_by_score_desc, Document, Filters, RankedHit};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

const BACKEND: &str = "memory";

#[derive(Default)]
struct Collection {
    dimension: Option<usize>,
    documents: Vec<Document>,
    positions: HashMap<String, usize>,
}

impl Collection {
    fn upsert(&mut self, document: Document) {
        match self.positions.get(&document.id) {
            Some(&pos) => self.documents[pos] = document,
            None => {
                self.positions.insert(document.id.clone(), self.documents.len());
                self.documents.push(document);
            }
        }
    }

    fn remove(&mut self, ids: &[String]) {
        let before = self.documents.len();
        self.documents.retain(|d| !ids.contains(&d.id));
        if self.documents.len() != before {
            self.positions = self
                .documents
                .iter()
                .enumerate()
                .map(|(i, d)| (d.id.clone(), i))
                .collect();
        }
    }
}

/// Brute-force store; the collection is created lazily by the first upsert
/// when `create_collection` was not called.
pub struct InMemoryVectorStore {
    name: String,
    collection: RwLock<Option<Collection>>,
}

impl InMemoryVectorStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: RwLock::new(None),
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn create_collection(&self, dimension: usize) -> Result<()> {
        let mut guard = self.collection.write().await;
        *guard = Some(Collection {
            dimension: Some(dimension),
            ..Collection::default()
        });
        tracing::debug!(collection = %self.name, dimension, "Created in-memory collection");
        Ok(())
    }

    async fn batch_upsert(&self, documents: &[Document]) -> Result<()> {
        let mut guard = self.collection.write().await;
        let collection = guard.get_or_insert_with(Collection::default);

        for document in documents {
            let vector = require_vector(BACKEND, document)?;
            match collection.dimension {
                Some(dim) if dim != vector.len() => {
                    return Err(AppError::backend(
                        BACKEND,
                        format!(
                            "document {} has dimension {}, collection expects {}",
                            document.id,
                            vector.len(),
                            dim
                        ),
                    ));
                }
                Some(_) => {}
                None => collection.dimension = Some(vector.len()),
            }
        }

        for document in documents {
            collection.upsert(document.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filters: Option<&Filters>,
    ) -> Result<Vec<RankedHit>> {
        let guard = self.collection.read().await;
        let Some(collection) = guard.as_ref() else {
            return Ok(vec![]);
        };
        if let Some(dim) = collection.dimension {
            if dim != query_vector.len() {
                return Err(AppError::backend(
                    BACKEND,
                    format!("query has dimension {}, collection expects {}", query_vector.len(), dim),
                ));
            }
        }

        let mut hits: Vec<RankedHit> = collection
            .documents
            .iter()
            .filter(|d| filters.map_or(true, |f| d.matches(f)))
            .filter_map(|d| {
                let vector = d.vector.as_deref()?;
                let mut document = d.clone();
                document.vector = None;
                Some(RankedHit::new(document, cosine_similarity(query_vector, vector)))
            })
            .collect();

        sort_by_score_desc(&mut hits);
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if let Some(collection) = self.collection.write().await.as_mut() {
            collection.remove(ids);
        }
        Ok(())
    }

    async fn stats(&self) -> Result<CollectionStats> {
        let guard = self.collection.read().await;
        Ok(CollectionStats {
            name: self.name.clone(),
            backend: BACKEND.to_string(),
            num_entities: guard.as_ref().map_or(0, |c| c.documents.len()),
            dimension: guard.as_ref().and_then(|c| c.dimension),
            status: Some(if guard.is_some() { "ready" } else { "empty" }.to_string()),
        })
    }

    async fn drop_collection(&self) -> Result<()> {
        *self.collection.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, vector: Vec<f32>, category: &str) -> Document {
        let mut d = Document::new(id, format!("text of {}", id)).with_metadata("category", category);
        d.vector = Some(vector);
        d
    }

    #[tokio::test]
    async fn test_search_orders_by_cosine() {
        let store = InMemoryVectorStore::new("test");
        store
            .batch_upsert(&[
                doc("a", vec![1.0, 0.0], "tech"),
                doc("b", vec![0.0, 1.0], "tech"),
                doc("c", vec![0.7, 0.7], "news"),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.1], 3, None).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert!(hits[0].document.vector.is_none());
    }

    #[tokio::test]
    async fn test_filters_and_top_k() {
        let store = InMemoryVectorStore::new("test");
        store
            .batch_upsert(&[
                doc("a", vec![1.0, 0.0], "tech"),
                doc("b", vec![0.9, 0.1], "news"),
                doc("c", vec![0.8, 0.2], "tech"),
            ])
            .await
            .unwrap();

        let mut filters = Filters::new();
        filters.insert("category".into(), "tech".into());
        let hits = store.search(&[1.0, 0.0], 1, Some(&filters)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id(), "a");
    }

    #[tokio::test]
    async fn test_upsert_overwrites_and_delete_removes() {
        let store = InMemoryVectorStore::new("test");
        store.batch_upsert(&[doc("a", vec![1.0, 0.0], "tech")]).await.unwrap();
        let mut replacement = doc("a", vec![0.0, 1.0], "tech");
        replacement.text = "new text".into();
        store.batch_upsert(&[replacement]).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.num_entities, 1);
        let hits = store.search(&[0.0, 1.0], 5, None).await.unwrap();
        assert_eq!(hits[0].document.text, "new text");

        store.delete(&["a".to_string()]).await.unwrap();
        assert_eq!(store.stats().await.unwrap().num_entities, 0);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_backend_failure() {
        let store = InMemoryVectorStore::new("test");
        store.create_collection(3).await.unwrap();
        let err = store
            .batch_upsert(&[doc("a", vec![1.0, 0.0], "tech")])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Backend { .. }));
    }

    #[tokio::test]
    async fn test_search_before_any_upsert_is_empty() {
        let store = InMemoryVectorStore::new("test");
        assert!(store.search(&[1.0], 5, None).await.unwrap().is_empty());
        store.drop_collection().await.unwrap();
        assert_eq!(store.stats().await.unwrap().status.as_deref(), Some("empty"));
    }
}
