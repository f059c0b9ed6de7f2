//! Query expansion: multi-query paraphrasing and hypothetical passages
//!
//! Expansion never fails. Without a generation provider, or when the
//! provider errors, the candidate set falls back to the original query.

use ragforge_common::generation::GenerationProvider;
use ragforge_common::metrics;
use std::sync::Arc;
use tracing::{debug, warn};

/// Produces the list of queries the search pipeline runs
#[derive(Clone)]
pub struct QueryExpander {
    generator: Option<Arc<dyn GenerationProvider>>,
    multi_query_count: usize,
}

impl QueryExpander {
    pub fn new(generator: Option<Arc<dyn GenerationProvider>>, multi_query_count: usize) -> Self {
        Self {
            generator,
            multi_query_count: multi_query_count.max(1),
        }
    }

    /// Candidate queries, the original always first
    pub async fn expand(&self, query: &str, multi_query: bool, hyde: bool) -> Vec<String> {
        let mut queries = if multi_query {
            self.paraphrases(query).await
        } else {
            vec![query.to_string()]
        };

        if hyde {
            if let Some(passage) = self.hypothetical_passage(query).await {
                queries.push(passage);
            }
        }

        debug!(count = queries.len(), "Expanded query set");
        queries
    }

    async fn paraphrases(&self, query: &str) -> Vec<String> {
        let Some(generator) = &self.generator else {
            metrics::record_degradation("multi_query");
            return vec![query.to_string()];
        };

        match generator.expand_query(query, self.multi_query_count).await {
            Ok(variants) => {
                let mut queries = vec![query.to_string()];
                queries.extend(variants.into_iter().filter(|v| v != query && !v.trim().is_empty()));
                queries.truncate(self.multi_query_count);
                queries
            }
            Err(e) => {
                warn!(error = %e, "Multi-query expansion failed, using the original query");
                metrics::record_degradation("multi_query");
                vec![query.to_string()]
            }
        }
    }

    async fn hypothetical_passage(&self, query: &str) -> Option<String> {
        let Some(generator) = &self.generator else {
            metrics::record_degradation("hyde");
            return None;
        };

        match generator.generate_hypothetical_passage(query).await {
            Ok(passage) if !passage.trim().is_empty() => Some(passage),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Hypothetical passage generation failed");
                metrics::record_degradation("hyde");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragforge_common::errors::{AppError, Result};

    struct Scripted {
        fail: bool,
    }

    #[async_trait]
    impl GenerationProvider for Scripted {
        async fn expand_query(&self, query: &str, n: usize) -> Result<Vec<String>> {
            if self.fail {
                return Err(AppError::Generation {
                    message: "boom".into(),
                });
            }
            let mut out = vec![query.to_string()];
            out.extend((1..=n + 2).map(|i| format!("variant {}", i)));
            Ok(out)
        }

        async fn generate_hypothetical_passage(&self, _query: &str) -> Result<String> {
            if self.fail {
                return Err(AppError::Generation {
                    message: "boom".into(),
                });
            }
            Ok("A hypothetical passage".into())
        }

        async fn score_relevance(&self, _: &str, _: &[String], _: usize) -> Result<Vec<(usize, f32)>> {
            Ok(vec![])
        }

        async fn synthesize_answer(&self, _: &str, _: &[String]) -> Result<String> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_disabled_expansion_is_original_only() {
        let expander = QueryExpander::new(Some(Arc::new(Scripted { fail: false })), 3);
        assert_eq!(expander.expand("q", false, false).await, vec!["q".to_string()]);
    }

    #[tokio::test]
    async fn test_multi_query_and_hyde() {
        let expander = QueryExpander::new(Some(Arc::new(Scripted { fail: false })), 3);
        let queries = expander.expand("q", true, true).await;
        assert_eq!(
            queries,
            vec![
                "q".to_string(),
                "variant 1".to_string(),
                "variant 2".to_string(),
                "A hypothetical passage".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_failures_degrade_to_original() {
        let expander = QueryExpander::new(Some(Arc::new(Scripted { fail: true })), 3);
        assert_eq!(expander.expand("q", true, true).await, vec!["q".to_string()]);

        let expander = QueryExpander::new(None, 3);
        assert_eq!(expander.expand("q", true, true).await, vec!["q".to_string()]);
    }
}
