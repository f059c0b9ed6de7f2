//! Reciprocal Rank Fusion (RRF) for combining search results
//!
//! RRF is a simple but effective fusion method that:
//! - Doesn't require score normalization
//! - Only looks at rank positions, so BM25 and cosine scores can be mixed
//!
//! The vector list is authoritative for document content. Ids that appear
//! only in the lexical list have no document attached and are not emitted.

use super::{assign_ranks, bm25::LexicalHit};
use ragforge_common::errors::{AppError, Result};
use ragforge_common::models::{sort_by_score_desc, RankedHit};
use std::collections::{HashMap, HashSet};

/// RRF fusion parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RrfFusion {
    /// Rank-decay constant (typically 60)
    k: f32,

    /// Weight for vector results; lexical results get `1 - vector_weight`
    vector_weight: f32,
}

impl Default for RrfFusion {
    fn default() -> Self {
        Self {
            k: 60.0,
            vector_weight: 0.6,
        }
    }
}

impl RrfFusion {
    /// Create with a custom constant and vector weight
    pub fn new(k: f32, vector_weight: f32) -> Result<Self> {
        if !k.is_finite() || k <= 0.0 {
            return Err(AppError::config(format!("rrf k must be a positive number, got {}", k)));
        }
        if !(0.0..=1.0).contains(&vector_weight) {
            return Err(AppError::config(format!(
                "vector weight must be within [0, 1], got {}",
                vector_weight
            )));
        }
        Ok(Self { k, vector_weight })
    }

    pub fn k(&self) -> f32 {
        self.k
    }

    pub fn vector_weight(&self) -> f32 {
        self.vector_weight
    }

    pub fn lexical_weight(&self) -> f32 {
        1.0 - self.vector_weight
    }

    /// Contribution of a 0-based rank
    fn contribution(&self, weight: f32, rank: usize) -> f32 {
        weight / (self.k + rank as f32 + 1.0)
    }

    /// Score lexical-only hits on the fused scale, as if the vector list
    /// were empty. Input order is kept.
    pub fn fuse_lexical_only(&self, mut hits: Vec<RankedHit>) -> Vec<RankedHit> {
        for (rank, hit) in hits.iter_mut().enumerate() {
            hit.score = self.contribution(self.lexical_weight(), rank);
        }
        assign_ranks(&mut hits);
        hits
    }

    /// Fuse vector and lexical rankings.
    ///
    /// Output order is descending fused score with ties in vector order;
    /// `rank` is reassigned from 1.
    pub fn fuse(&self, vector_hits: Vec<RankedHit>, lexical_hits: &[LexicalHit]) -> Vec<RankedHit> {
        let mut lexical_rank: HashMap<&str, usize> = HashMap::with_capacity(lexical_hits.len());
        for (rank, hit) in lexical_hits.iter().enumerate() {
            lexical_rank.entry(hit.id.as_str()).or_insert(rank);
        }

        let mut fused: Vec<RankedHit> = Vec::with_capacity(vector_hits.len());
        let mut seen: HashSet<String> = HashSet::with_capacity(vector_hits.len());

        for (rank, hit) in vector_hits.into_iter().enumerate() {
            if !seen.insert(hit.id().to_string()) {
                continue;
            }
            let lexical = lexical_rank
                .get(hit.id())
                .map(|&r| self.contribution(self.lexical_weight(), r))
                .unwrap_or(0.0);
            let score = self.contribution(self.vector_weight, rank) + lexical;

            fused.push(RankedHit {
                score,
                rank: None,
                document: hit.document,
            });
        }

        sort_by_score_desc(&mut fused);
        assign_ranks(&mut fused);
        fused
    }
}

/// Min-max scale scores into [0, 1]; when all scores are equal every score
/// becomes 1.0.
pub fn normalize_scores(hits: &mut [RankedHit]) {
    let Some(first) = hits.first() else {
        return;
    };
    let (min, max) = hits
        .iter()
        .fold((first.score, first.score), |(lo, hi), h| (lo.min(h.score), hi.max(h.score)));

    let range = max - min;
    for hit in hits.iter_mut() {
        hit.score = if range > 0.0 { (hit.score - min) / range } else { 1.0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragforge_common::models::Document;

    fn vector_hit(id: &str, score: f32) -> RankedHit {
        RankedHit::new(Document::new(id, format!("text {}", id)), score)
    }

    fn lexical_hit(id: &str) -> LexicalHit {
        LexicalHit {
            id: id.to_string(),
            score: 1.0,
        }
    }

    #[test]
    fn test_rrf_fusion() {
        let fusion = RrfFusion::default();

        // Vector:  [A, B, C]
        // Lexical: [B, A, D]
        // A and B appear in both lists and lead; lexical-only D is dropped
        let vector = vec![vector_hit("A", 0.9), vector_hit("B", 0.8), vector_hit("C", 0.7)];
        let lexical = vec![lexical_hit("B"), lexical_hit("A"), lexical_hit("D")];

        let results = fusion.fuse(vector, &lexical);
        let ids: Vec<&str> = results.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);

        let expected_a = 0.6 / 61.0 + 0.4 / 62.0;
        let expected_b = 0.6 / 62.0 + 0.4 / 61.0;
        assert!((results[0].score - expected_a).abs() < 1e-6);
        assert!((results[1].score - expected_b).abs() < 1e-6);
        assert_eq!(results[2].score, 0.6 / 63.0);
        assert_eq!(
            results.iter().map(|h| h.rank).collect::<Vec<_>>(),
            vec![Some(1), Some(2), Some(3)]
        );
    }

    #[test]
    fn test_lexical_weight_can_reorder() {
        let fusion = RrfFusion::new(60.0, 0.2).unwrap();
        let vector = vec![vector_hit("A", 0.9), vector_hit("B", 0.8)];
        let lexical = vec![lexical_hit("B")];
        let results = fusion.fuse(vector, &lexical);
        assert_eq!(results[0].id(), "B");
    }

    #[test]
    fn test_fused_score_monotone_in_rank() {
        let fusion = RrfFusion::default();
        let vector: Vec<RankedHit> = (0..20).map(|i| vector_hit(&i.to_string(), 1.0)).collect();
        let results = fusion.fuse(vector, &[]);
        for pair in results.windows(2) {
            assert!(pair[0].score > pair[1].score);
        }
        assert_eq!(results[0].id(), "0");
    }

    #[test]
    fn test_lexical_promotion_never_lowers_score() {
        let fusion = RrfFusion::default();
        let ids = ["A", "B", "C", "D", "E"];
        let vector = || -> Vec<RankedHit> { ids.iter().map(|id| vector_hit(id, 1.0)).collect() };
        let score_of = |results: &[RankedHit], id: &str| {
            results.iter().find(|h| h.id() == id).map(|h| h.score).unwrap()
        };

        // D climbs the lexical list while the vector list stays fixed
        let mut previous = score_of(&fusion.fuse(vector(), &[]), "D");
        for position in (0..ids.len()).rev() {
            let mut lexical: Vec<LexicalHit> =
                ids.iter().filter(|id| **id != "D").map(|id| lexical_hit(id)).collect();
            lexical.insert(position.min(lexical.len()), lexical_hit("D"));

            let score = score_of(&fusion.fuse(vector(), &lexical), "D");
            assert!(score >= previous, "D at lexical rank {} scored lower", position);
            previous = score;
        }
    }

    #[test]
    fn test_lexical_only_scores_share_fused_scale() {
        let fusion = RrfFusion::default();
        let hits = vec![vector_hit("x", 7.5), vector_hit("y", 3.2)];
        let results = fusion.fuse_lexical_only(hits);

        assert_eq!(results[0].id(), "x");
        assert!((results[0].score - 0.4 / 61.0).abs() < 1e-6);
        assert!((results[1].score - 0.4 / 62.0).abs() < 1e-6);
        assert_eq!(results[1].rank, Some(2));
    }

    #[test]
    fn test_empty_inputs() {
        let fusion = RrfFusion::default();
        assert!(fusion.fuse(vec![], &[lexical_hit("A")]).is_empty());
        assert!(fusion.fuse(vec![], &[]).is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(RrfFusion::new(60.0, 1.5).is_err());
        assert!(RrfFusion::new(60.0, -0.1).is_err());
        assert!(RrfFusion::new(0.0, 0.5).is_err());
        assert!(RrfFusion::new(f32::NAN, 0.5).is_err());
        assert!(RrfFusion::new(1.0, 1.0).is_ok());
    }

    #[test]
    fn test_normalize_scores() {
        let mut hits = vec![vector_hit("a", 4.0), vector_hit("b", 2.0), vector_hit("c", 3.0)];
        normalize_scores(&mut hits);
        let scores: Vec<f32> = hits.iter().map(|h| h.score).collect();
        assert_eq!(scores, vec![1.0, 0.0, 0.5]);

        let mut equal = vec![vector_hit("a", 0.3), vector_hit("b", 0.3)];
        normalize_scores(&mut equal);
        assert!(equal.iter().all(|h| h.score == 1.0));

        let mut empty: Vec<RankedHit> = vec![];
        normalize_scores(&mut empty);
    }
}
