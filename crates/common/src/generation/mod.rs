//! Generation provider abstraction
//!
//! The retrieval pipeline uses a chat model for four jobs:
//! - Query rewriting (multi-query expansion)
//! - Hypothetical passage generation (HyDE)
//! - Relevance scoring of retrieved passages
//! - Answer synthesis from retrieved context
//!
//! A provider without credentials is not an error for retrieval-only use:
//! [`create_generator`] returns `None` and callers skip those stages.

mod chat;

pub use chat::{ChatGenerator, ChatMessage};

use crate::config::GenerationConfig;
use crate::errors::Result;
use async_trait::async_trait;
use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

/// LLM-backed capabilities consumed by the orchestrator
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Up to `n` query variants, the original query first
    async fn expand_query(&self, query: &str, n: usize) -> Result<Vec<String>>;

    /// A plausible answer passage used as an extra retrieval query
    async fn generate_hypothetical_passage(&self, query: &str) -> Result<String>;

    /// `(document index, relevance score)` pairs sorted by descending score,
    /// at most `top_k` of them. Indices refer to `documents`.
    async fn score_relevance(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> Result<Vec<(usize, f32)>>;

    /// Answer `query` grounded in `contexts`
    async fn synthesize_answer(&self, query: &str, contexts: &[String]) -> Result<String>;
}

/// Build the configured provider, or `None` when no credential is set
pub fn create_generator(config: &GenerationConfig) -> Result<Option<Arc<dyn GenerationProvider>>> {
    if !config.has_credentials() {
        tracing::warn!(
            "No generation API key configured; query expansion, reranking and answer synthesis are disabled"
        );
        return Ok(None);
    }
    Ok(Some(Arc::new(ChatGenerator::new(config.clone())?)))
}

fn list_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"^\s*(?:\d+\s*[.)]|[-*•])\s*").expect("static regex")
    })
}

fn score_line() -> &'static Regex {
    static SCORE: OnceLock<Regex> = OnceLock::new();
    SCORE.get_or_init(|| {
        Regex::new(r"^\s*(\d+)\s*:\s*([-+]?\d+(?:\.\d+)?)\s*$").expect("static regex")
    })
}

/// Turn a one-query-per-line completion into at most `n` queries with
/// `original` first. Blank lines, list markers and repeats are dropped.
pub fn parse_paraphrases(original: &str, response: &str, n: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut queries = vec![original.to_string()];
    seen.insert(original.trim().to_lowercase());

    for line in response.lines() {
        if queries.len() >= n {
            break;
        }
        let candidate = list_marker().replace(line, "").trim().to_string();
        if candidate.is_empty() || !seen.insert(candidate.to_lowercase()) {
            continue;
        }
        queries.push(candidate);
    }

    queries.truncate(n.max(1));
    queries
}

/// Parse `"<1-based index>: <score>"` lines into `(0-based index, score)`.
///
/// Lines that do not parse, indices outside `1..=doc_count` and repeated
/// indices are skipped. The result is sorted by descending score (stable)
/// and truncated to `top_k`.
pub fn parse_relevance_scores(response: &str, doc_count: usize, top_k: usize) -> Vec<(usize, f32)> {
    let mut seen = HashSet::new();
    let mut scores: Vec<(usize, f32)> = Vec::new();

    for line in response.lines() {
        let Some(caps) = score_line().captures(line) else {
            if !line.trim().is_empty() {
                tracing::debug!(line = %line, "Skipping unparseable relevance line");
            }
            continue;
        };
        let (Ok(index), Ok(score)) = (caps[1].parse::<usize>(), caps[2].parse::<f32>()) else {
            continue;
        };
        if index == 0 || index > doc_count || !score.is_finite() {
            continue;
        }
        if seen.insert(index - 1) {
            scores.push((index - 1, score));
        }
    }

    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scores.truncate(top_k);
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paraphrases_keep_original_first() {
        let response = "1. What does deep learning mean?\n\n- Explain deep learning\nDefine deep learning\n";
        let queries = parse_paraphrases("What is deep learning?", response, 3);
        assert_eq!(
            queries,
            vec![
                "What is deep learning?".to_string(),
                "What does deep learning mean?".to_string(),
                "Explain deep learning".to_string(),
            ]
        );
    }

    #[test]
    fn test_paraphrases_drop_repeats_of_original() {
        let queries = parse_paraphrases("q", "Q\nq\nother", 3);
        assert_eq!(queries, vec!["q".to_string(), "other".to_string()]);
    }

    #[test]
    fn test_paraphrases_empty_response() {
        assert_eq!(parse_paraphrases("q", "", 3), vec!["q".to_string()]);
    }

    #[test]
    fn test_relevance_scores_skip_bad_lines() {
        let response = "1: 3\n2: 9.5\nthree: 7\n4: high\n5: 8\n9: 10\n0: 10\n2: 1";
        let scores = parse_relevance_scores(response, 5, 10);
        assert_eq!(scores, vec![(1, 9.5), (4, 8.0), (0, 3.0)]);
    }

    #[test]
    fn test_relevance_scores_truncate() {
        let scores = parse_relevance_scores("1: 1\n2: 2\n3: 3", 3, 2);
        assert_eq!(scores, vec![(2, 3.0), (1, 2.0)]);
    }

    #[test]
    fn test_create_generator_without_key() {
        let config = GenerationConfig::default();
        assert!(create_generator(&config).unwrap().is_none());
    }
}
