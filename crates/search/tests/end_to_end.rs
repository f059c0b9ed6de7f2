//! End-to-end pipeline tests over the in-memory store and the hashing embedder

use async_trait::async_trait;
use ragforge_common::config::{ChunkingConfig, RagConfig};
use ragforge_common::embeddings::HashingEmbedder;
use ragforge_common::errors::{AppError, Result};
use ragforge_common::generation::{parse_relevance_scores, GenerationProvider};
use ragforge_common::models::{Document, Filters, QueryConfiguration, RankedHit, SearchOptions};
use ragforge_common::vectorstore::{CollectionStats, InMemoryVectorStore, VectorStore};
use ragforge_search::RetrievalOrchestrator;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Generation provider with canned responses that records what it was asked
#[derive(Default)]
struct ScriptedGenerator {
    paraphrases: Vec<String>,
    relevance_response: String,
    fail_everything: bool,
    expand_calls: AtomicUsize,
    contexts_seen: Mutex<Vec<String>>,
    documents_seen: Mutex<Vec<String>>,
}

fn offline() -> AppError {
    AppError::CollaboratorUnavailable {
        collaborator: "generation".into(),
        message: "scripted failure".into(),
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    async fn expand_query(&self, query: &str, n: usize) -> Result<Vec<String>> {
        self.expand_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_everything {
            return Err(offline());
        }
        let mut queries = vec![query.to_string()];
        queries.extend(self.paraphrases.iter().cloned());
        queries.truncate(n);
        Ok(queries)
    }

    async fn generate_hypothetical_passage(&self, _query: &str) -> Result<String> {
        if self.fail_everything {
            return Err(offline());
        }
        Ok("Computer vision processes images with convolutional networks".into())
    }

    async fn score_relevance(&self, _query: &str, documents: &[String], top_k: usize) -> Result<Vec<(usize, f32)>> {
        if self.fail_everything {
            return Err(offline());
        }
        *self.documents_seen.lock().unwrap() = documents.to_vec();
        Ok(parse_relevance_scores(&self.relevance_response, documents.len(), top_k))
    }

    async fn synthesize_answer(&self, _query: &str, contexts: &[String]) -> Result<String> {
        if self.fail_everything {
            return Err(offline());
        }
        *self.contexts_seen.lock().unwrap() = contexts.to_vec();
        Ok(format!("Answer grounded in {} passages", contexts.len()))
    }
}

/// In-memory store whose first search fails
struct FlakyStore {
    inner: InMemoryVectorStore,
    failed_once: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: InMemoryVectorStore::new("flaky"),
            failed_once: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl VectorStore for FlakyStore {
    fn backend(&self) -> &'static str {
        "flaky"
    }
    async fn create_collection(&self, dimension: usize) -> Result<()> {
        self.inner.create_collection(dimension).await
    }
    async fn batch_upsert(&self, documents: &[Document]) -> Result<()> {
        self.inner.batch_upsert(documents).await
    }
    async fn search(&self, vector: &[f32], top_k: usize, filters: Option<&Filters>) -> Result<Vec<RankedHit>> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(AppError::backend("flaky", "connection reset"));
        }
        self.inner.search(vector, top_k, filters).await
    }
    async fn delete(&self, ids: &[String]) -> Result<()> {
        self.inner.delete(ids).await
    }
    async fn stats(&self) -> Result<CollectionStats> {
        self.inner.stats().await
    }
    async fn drop_collection(&self) -> Result<()> {
        self.inner.drop_collection().await
    }
}

fn corpus() -> Vec<Document> {
    vec![
        Document::new("doc1", "Deep learning is a subset of machine learning").with_metadata("category", "tech"),
        Document::new("doc2", "Natural language processing handles text").with_metadata("category", "tech"),
        Document::new("doc3", "Computer vision processes images").with_metadata("category", "vision"),
    ]
}

fn engine(config: RagConfig, generator: Option<Arc<ScriptedGenerator>>) -> RetrievalOrchestrator {
    RetrievalOrchestrator::new(
        config,
        Arc::new(InMemoryVectorStore::new("e2e")),
        Arc::new(HashingEmbedder::new(384)),
        generator.map(|g| g as Arc<dyn GenerationProvider>),
    )
    .unwrap()
}

#[tokio::test]
async fn hybrid_search_over_three_documents() {
    let engine = engine(RagConfig::default(), None);
    engine.create_collection().await.unwrap();
    engine.index_documents(corpus()).await.unwrap();

    let results = engine
        .search("What is deep learning?", &SearchOptions::default().with_top_k(2))
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id(), "doc1");
    let ids: HashSet<&str> = results.iter().map(|h| h.id()).collect();
    assert_eq!(ids.len(), 2);
    assert!(results[0].score >= results[1].score);
}

#[tokio::test]
async fn hybrid_search_over_reference_corpus() {
    let engine = engine(RagConfig::default(), None);
    engine
        .index_documents(vec![
            Document::new("d1", "Deep learning uses multi-layer neural networks."),
            Document::new("d2", "Python is a high-level programming language."),
            Document::new("d3", "A vector database stores embeddings for similarity search."),
        ])
        .await
        .unwrap();

    let results = engine
        .search("What is deep learning?", &SearchOptions::default().with_top_k(2))
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id(), "d1");
    assert_ne!(results[0].id(), results[1].id());
    assert!(results[0].score >= results[1].score);
}

#[tokio::test]
async fn transient_vector_failure_keeps_one_score_scale() {
    let generator = Arc::new(ScriptedGenerator {
        paraphrases: vec!["Explain deep learning".into()],
        ..ScriptedGenerator::default()
    });
    let engine = RetrievalOrchestrator::new(
        RagConfig::default(),
        Arc::new(FlakyStore::new()),
        Arc::new(HashingEmbedder::new(384)),
        Some(generator as Arc<dyn GenerationProvider>),
    )
    .unwrap();
    engine.index_documents(corpus()).await.unwrap();

    let options = SearchOptions {
        enable_multi_query: true,
        ..SearchOptions::default()
    };
    let results = engine.search("What is deep learning?", &options).await;

    // The original query hits the failing store and falls back to lexical
    // matches; the paraphrase is fused normally. Every score stays within
    // the RRF ceiling of 1 / (k + 1).
    assert!(results.iter().any(|h| h.id() == "doc1"));
    for hit in &results {
        assert!(hit.score <= 1.0 / 61.0 + 1e-6, "{} scored {}", hit.id(), hit.score);
    }
}

#[tokio::test]
async fn multi_query_merge_keeps_unique_ids() {
    let generator = Arc::new(ScriptedGenerator {
        paraphrases: vec![
            "Explain deep learning".into(),
            "How do computers understand images".into(),
        ],
        ..ScriptedGenerator::default()
    });
    let engine = engine(RagConfig::default(), Some(generator.clone()));
    engine.index_documents(corpus()).await.unwrap();

    let options = SearchOptions {
        enable_multi_query: true,
        enable_hyde: true,
        ..SearchOptions::default()
    };
    let results = engine.search("What is deep learning?", &options).await;

    assert_eq!(generator.expand_calls.load(Ordering::SeqCst), 1);
    let ids: Vec<&str> = results.iter().map(|h| h.id()).collect();
    let unique: HashSet<&str> = ids.iter().copied().collect();
    assert_eq!(ids.len(), unique.len());
    assert_eq!(ids.len(), 3);
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn query_reranks_and_answers() {
    let generator = Arc::new(ScriptedGenerator {
        // Out-of-range and malformed lines are skipped
        relevance_response: "1: 2\n2: not a score\n3: 9\n7: 10".into(),
        ..ScriptedGenerator::default()
    });
    let engine = engine(RagConfig::default(), Some(generator.clone()));
    engine.index_documents(corpus()).await.unwrap();

    let request = QueryConfiguration::new("What is deep learning?", 3);
    let response = engine.query(&request, true).await.unwrap();

    // Search ranks doc1 first, so "3: 9" refers to the third search result
    let scored = generator.documents_seen.lock().unwrap().clone();
    assert_eq!(scored.len(), 3);
    assert_eq!(response.num_results, 2);
    assert_eq!(response.results[0].score, 9.0);
    assert_eq!(response.results[0].document.text, scored[2]);
    assert_eq!(response.results[1].id(), "doc1");
    assert_eq!(response.results[0].rank, Some(1));
    assert_eq!(response.results[1].rank, Some(2));

    assert_eq!(response.answer, "Answer grounded in 2 passages");
    assert_eq!(generator.contexts_seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn failing_generator_degrades_every_stage() {
    let generator = Arc::new(ScriptedGenerator {
        fail_everything: true,
        ..ScriptedGenerator::default()
    });
    let engine = engine(RagConfig::default(), Some(generator));
    engine.index_documents(corpus()).await.unwrap();

    let response = engine
        .query(&QueryConfiguration::new("What is deep learning?", 10), true)
        .await
        .unwrap();

    assert_eq!(response.num_results, 3);
    assert_eq!(response.results[0].id(), "doc1");
    assert_eq!(response.answer, "");
}

#[tokio::test]
async fn rerank_truncates_long_documents_for_scoring() {
    let generator = Arc::new(ScriptedGenerator {
        relevance_response: "1: 5".into(),
        ..ScriptedGenerator::default()
    });
    let engine = engine(RagConfig::default(), Some(generator.clone()));
    let long_text = "x".repeat(2000);
    engine
        .index_documents(vec![Document::new("long", long_text)])
        .await
        .unwrap();

    let results = engine.search("x", &SearchOptions::default()).await;
    let reranked = engine.rerank("x", results, 5).await;

    assert_eq!(reranked.len(), 1);
    assert_eq!(reranked[0].score, 5.0);
    assert_eq!(reranked[0].document.text.len(), 2000);
    assert_eq!(generator.documents_seen.lock().unwrap()[0].chars().count(), 500);
}

#[tokio::test]
async fn long_document_parent_child_round_trip() {
    let config = RagConfig {
        chunking: ChunkingConfig::parent_child(512, 50, 2048),
        ..RagConfig::default()
    };
    let engine = engine(config, None);

    let text: String = (0..5000)
        .map(|i| if i % 7 == 6 { ' ' } else { char::from(b'a' + (i % 26) as u8) })
        .collect();
    let report = engine
        .index_documents(vec![Document::new("big", text.clone())])
        .await
        .unwrap();
    assert!(report.indexed_documents >= 3);

    let results = engine.search(&text[100..160], &SearchOptions::default()).await;
    assert!(!results.is_empty());
    for hit in &results {
        assert!(hit.document.text.chars().count() <= 2048);
        assert!(text.contains(hit.document.text.as_str()));
    }
}

#[tokio::test]
async fn empty_store_returns_nothing() {
    let engine = engine(RagConfig::default(), None);
    let vector_only = SearchOptions::default().hybrid(false);
    assert!(engine.search("anything", &vector_only).await.is_empty());
    assert!(engine.search("anything", &SearchOptions::default()).await.is_empty());
}
