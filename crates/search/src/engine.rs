//! Retrieval orchestrator
//!
//! Owns the collaborators (vector store, embedder, optional generation
//! provider), the current lexical index generation and the child -> parent
//! map, and runs the indexing, search and answer pipelines over them.
//!
//! Indexing is single-writer: writers hold `indexing` for the whole run and
//! build the next lexical generation off-lock, then swap it in under a short
//! write lock. Searches clone the current generation under a read lock, so
//! they observe either the old or the new index, never a partial one.

use crate::expansion::QueryExpander;
use crate::retrieval::{
    assign_ranks, merge_results, promote_parents, HybridRetriever, LexicalIndex, Retriever,
    RrfFusion, VectorRetriever,
};
use ragforge_common::config::{ParentMapPolicy, RagConfig};
use ragforge_common::embeddings::{create_embedder, Embedder};
use ragforge_common::errors::{AppError, Result};
use ragforge_common::generation::{create_generator, GenerationProvider};
use ragforge_common::metrics;
use ragforge_common::models::{
    Document, ParentMap, QueryConfiguration, QueryResponse, RankedHit, SearchOptions,
};
use ragforge_common::vectorstore::{create_vector_store, CollectionStats, VectorStore};
use ragforge_ingestion::make_parent_child_documents;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Outcome of one indexing call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    /// Documents passed in by the caller
    pub source_documents: usize,
    /// Documents embedded and upserted (children when chunking is on)
    pub indexed_documents: usize,
    /// Entries in the parent map after this call
    pub parent_map_size: usize,
    /// Documents in the new lexical generation
    pub lexical_documents: usize,
}

/// Vector store statistics plus in-process index sizes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestratorStats {
    pub collection: CollectionStats,
    pub lexical_documents: usize,
    pub parent_map_size: usize,
}

#[derive(Default)]
struct IndexState {
    lexical: Arc<LexicalIndex>,
    parent_map: ParentMap,
}

/// Hybrid retrieval and answer pipeline
pub struct RetrievalOrchestrator {
    config: RagConfig,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    generator: Option<Arc<dyn GenerationProvider>>,
    fusion: RrfFusion,
    expander: QueryExpander,
    state: RwLock<IndexState>,
    indexing: Mutex<()>,
}

impl RetrievalOrchestrator {
    /// Create an orchestrator over explicit collaborators.
    ///
    /// Fails with a configuration error when `config` does not validate.
    pub fn new(
        config: RagConfig,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        generator: Option<Arc<dyn GenerationProvider>>,
    ) -> Result<Self> {
        config.validate()?;
        let fusion = RrfFusion::new(config.retrieval.rrf_k, config.retrieval.vector_weight)?;
        let expander = QueryExpander::new(generator.clone(), config.retrieval.multi_query_count);

        info!(
            backend = store.backend(),
            embedding_model = embedder.model_name(),
            generation = generator.is_some(),
            parent_child = config.chunking.enable_parent_child,
            "Retrieval orchestrator initialized"
        );

        Ok(Self {
            config,
            store,
            embedder,
            generator,
            fusion,
            expander,
            state: RwLock::new(IndexState::default()),
            indexing: Mutex::new(()),
        })
    }

    /// Build every collaborator from configuration
    pub fn from_config(config: RagConfig) -> Result<Self> {
        config.validate()?;
        let store = create_vector_store(&config.vector_store)?;
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        Self::new(config, store, embedder, generator)
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Whether expansion, rerank and answer synthesis can run
    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// (Re)create the vector collection sized for the embedder
    #[instrument(skip(self))]
    pub async fn create_collection(&self) -> Result<()> {
        self.store.create_collection(self.embedder.dimension()).await
    }

    /// Drop the vector collection and reset the in-process indexes
    #[instrument(skip(self))]
    pub async fn drop_collection(&self) -> Result<()> {
        let _writer = self.indexing.lock().await;
        self.store.drop_collection().await?;
        *self.state.write().await = IndexState::default();
        Ok(())
    }

    pub async fn stats(&self) -> Result<OrchestratorStats> {
        let collection = self.store.stats().await?;
        let state = self.state.read().await;
        Ok(OrchestratorStats {
            collection,
            lexical_documents: state.lexical.len(),
            parent_map_size: state.parent_map.len(),
        })
    }

    /// Remove documents from the vector store, the lexical index and the
    /// parent map
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn delete_documents(&self, ids: &[String]) -> Result<()> {
        let _writer = self.indexing.lock().await;
        self.store.delete(ids).await?;

        let current = self.state.read().await.lexical.clone();
        let next = Arc::new(current.without(ids));

        let mut state = self.state.write().await;
        state.lexical = next;
        for id in ids {
            state.parent_map.remove(id);
        }
        Ok(())
    }

    // ========================================================================
    // Indexing
    // ========================================================================

    /// Chunk (when enabled), embed, upsert and lexically index `documents`.
    ///
    /// Each call replaces the lexical index with one built from this call's
    /// documents. Errors are returned, and on error the lexical index and
    /// parent map are left as they were.
    #[instrument(skip(self, documents), fields(count = documents.len()))]
    pub async fn index_documents(&self, documents: Vec<Document>) -> Result<IndexReport> {
        let _writer = self.indexing.lock().await;
        let start = Instant::now();
        let source_documents = documents.len();

        let result = self.index_locked(documents).await;

        metrics::record_index(start.elapsed().as_secs_f64(), source_documents, result.is_ok());
        match &result {
            Ok(report) => info!(
                indexed = report.indexed_documents,
                parent_map = report.parent_map_size,
                "Indexing complete"
            ),
            Err(e) => warn!(error = %e, "Indexing failed"),
        }
        result
    }

    async fn index_locked(&self, documents: Vec<Document>) -> Result<IndexReport> {
        let source_documents = documents.len();
        let (mut documents, new_parents) = if self.config.chunking.enable_parent_child {
            let (children, parents) = self.chunk_documents(&documents)?;
            (children, Some(parents))
        } else {
            (documents, None)
        };

        self.embed_documents(&mut documents).await?;
        if !documents.is_empty() {
            self.store.batch_upsert(&documents).await?;
        }

        let mut next = LexicalIndex::new();
        next.index_documents(&documents);
        let next = Arc::new(next);

        let mut state = self.state.write().await;
        state.lexical = next;
        if let Some(parents) = new_parents {
            match self.config.retrieval.parent_map_policy {
                ParentMapPolicy::Merge => state.parent_map.extend(parents),
                ParentMapPolicy::Replace => state.parent_map = parents,
            }
        }

        Ok(IndexReport {
            source_documents,
            indexed_documents: documents.len(),
            parent_map_size: state.parent_map.len(),
            lexical_documents: state.lexical.len(),
        })
    }

    fn chunk_documents(&self, documents: &[Document]) -> Result<(Vec<Document>, ParentMap)> {
        let mut children = Vec::new();
        let mut parents = ParentMap::new();
        for document in documents {
            let (docs, map) = make_parent_child_documents(
                &document.id,
                &document.text,
                &document.metadata,
                &self.config.chunking,
            )?;
            children.extend(docs);
            parents.extend(map);
        }
        debug!(
            documents = documents.len(),
            children = children.len(),
            "Derived child documents"
        );
        Ok((children, parents))
    }

    async fn embed_documents(&self, documents: &mut [Document]) -> Result<()> {
        let batch_size = self.config.embedding.batch_size.max(1);
        for batch in documents.chunks_mut(batch_size) {
            let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(AppError::EmbeddingError {
                    message: format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        vectors.len()
                    ),
                });
            }
            for (document, vector) in batch.iter_mut().zip(vectors) {
                document.vector = Some(vector);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Run the search pipeline: expansion, per-query retrieval, cross-query
    /// merge, parent promotion and truncation to `options.top_k`.
    ///
    /// Collaborator failures degrade the affected stage; this never errors.
    #[instrument(skip(self, options), fields(top_k = options.top_k, hybrid = options.enable_hybrid))]
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Vec<RankedHit> {
        let start = Instant::now();
        let queries = self
            .expander
            .expand(query, options.enable_multi_query, options.enable_hyde)
            .await;

        let vector = VectorRetriever::new(self.store.clone(), self.embedder.clone());
        let retriever: Box<dyn Retriever> = if options.enable_hybrid {
            let lexical = self.state.read().await.lexical.clone();
            Box::new(HybridRetriever::new(vector, lexical, self.fusion))
        } else {
            Box::new(vector)
        };

        let mut lists = Vec::with_capacity(queries.len());
        for candidate in &queries {
            match retriever
                .retrieve(candidate, options.top_k, options.filters.as_ref())
                .await
            {
                Ok(hits) => lists.push(hits),
                Err(e) => {
                    warn!(error = %e, mode = retriever.mode().as_str(), "Retrieval failed for query variant");
                    metrics::record_backend_failure("vector");
                }
            }
        }

        let mut results = merge_results(lists);
        if self.config.chunking.enable_parent_child {
            let state = self.state.read().await;
            promote_parents(&mut results, &state.parent_map);
        }
        results.truncate(options.top_k);
        assign_ranks(&mut results);

        metrics::record_search(
            start.elapsed().as_secs_f64(),
            retriever.mode().as_str(),
            results.len(),
        );
        debug!(queries = queries.len(), results = results.len(), "Search complete");
        results
    }

    /// Reorder `results` by generation-provider relevance and keep `top_k`.
    ///
    /// Documents the provider did not score are dropped. Without a provider,
    /// on provider failure, or when no score could be parsed, the original
    /// order is kept (truncated to `top_k`).
    #[instrument(skip(self, results), fields(count = results.len()))]
    pub async fn rerank(&self, query: &str, mut results: Vec<RankedHit>, top_k: usize) -> Vec<RankedHit> {
        if results.is_empty() {
            return results;
        }
        let Some(generator) = &self.generator else {
            metrics::record_degradation("rerank");
            results.truncate(top_k);
            return results;
        };

        let snippet_chars = self.config.retrieval.rerank_snippet_chars;
        let snippets: Vec<String> = results
            .iter()
            .map(|h| h.document.text.chars().take(snippet_chars).collect())
            .collect();

        let scores = match generator.score_relevance(query, &snippets, top_k).await {
            Ok(scores) if !scores.is_empty() => scores,
            Ok(_) => {
                warn!("Relevance scoring returned no usable scores, keeping original order");
                metrics::record_degradation("rerank");
                results.truncate(top_k);
                return results;
            }
            Err(e) => {
                warn!(error = %e, "Relevance scoring failed, keeping original order");
                metrics::record_degradation("rerank");
                results.truncate(top_k);
                return results;
            }
        };

        let mut slots: Vec<Option<RankedHit>> = results.into_iter().map(Some).collect();
        let mut reranked = Vec::with_capacity(scores.len().min(top_k));
        for (index, score) in scores {
            if reranked.len() >= top_k {
                break;
            }
            if let Some(mut hit) = slots.get_mut(index).and_then(Option::take) {
                hit.score = score;
                reranked.push(hit);
            }
        }
        assign_ranks(&mut reranked);
        reranked
    }

    /// Full answer pipeline: search with multi-query expansion, optional
    /// rerank to `retrieval.final_top_k`, optional answer synthesis.
    #[instrument(skip(self, request), fields(top_k = request.top_k))]
    pub async fn query(&self, request: &QueryConfiguration, return_answer: bool) -> Result<QueryResponse> {
        request.validate()?;

        let mut options = SearchOptions::from(request);
        options.enable_multi_query = true;
        options.enable_hyde = false;

        let final_top_k = self.config.retrieval.final_top_k;
        let mut results = self.search(&request.query, &options).await;

        if request.enable_rerank && !results.is_empty() {
            results = self.rerank(&request.query, results, final_top_k).await;
        }

        let answer = if return_answer && !results.is_empty() {
            let contexts: Vec<String> = results
                .iter()
                .take(final_top_k)
                .map(|h| h.document.text.clone())
                .collect();
            self.synthesize(&request.query, &contexts).await
        } else {
            String::new()
        };

        Ok(QueryResponse {
            query: request.query.clone(),
            num_results: results.len(),
            results,
            answer,
        })
    }

    async fn synthesize(&self, query: &str, contexts: &[String]) -> String {
        let Some(generator) = &self.generator else {
            metrics::record_degradation("answer");
            return String::new();
        };
        match generator.synthesize_answer(query, contexts).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "Answer synthesis failed");
                metrics::record_degradation("answer");
                String::new()
            }
        }
    }
}
