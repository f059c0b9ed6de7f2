//! Cross-query merge and parent promotion

use ragforge_common::models::{
    sort_by_score_desc, MetadataValue, ParentMap, RankedHit, META_REPLACED_WITH_PARENT,
};
use std::collections::HashMap;

/// Merge per-query result lists into one list with unique ids.
///
/// A repeated id keeps its highest score (scores are never summed) and its
/// first position; the output is sorted by descending score, ties in
/// discovery order.
pub fn merge_results(lists: impl IntoIterator<Item = Vec<RankedHit>>) -> Vec<RankedHit> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<RankedHit> = Vec::new();

    for hit in lists.into_iter().flatten() {
        match positions.get(hit.id()) {
            Some(&pos) => {
                if hit.score > merged[pos].score {
                    merged[pos] = hit;
                }
            }
            None => {
                positions.insert(hit.id().to_string(), merged.len());
                merged.push(hit);
            }
        }
    }

    sort_by_score_desc(&mut merged);
    merged
}

/// Replace the text of every hit whose id is a child in `parent_map` with
/// the parent window and flag it; other hits pass through untouched.
pub fn promote_parents(hits: &mut [RankedHit], parent_map: &ParentMap) {
    for hit in hits.iter_mut() {
        if let Some(parent) = parent_map.get(hit.id()) {
            hit.document.text = parent.clone();
            hit.document
                .metadata
                .insert(META_REPLACED_WITH_PARENT.to_string(), MetadataValue::Bool(true));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragforge_common::models::Document;

    fn hit(id: &str, score: f32) -> RankedHit {
        RankedHit::new(Document::new(id, format!("child {}", id)), score)
    }

    #[test]
    fn test_merge_keeps_max_score_per_id() {
        let merged = merge_results(vec![
            vec![hit("a", 0.5), hit("b", 0.4)],
            vec![hit("b", 0.9), hit("c", 0.1)],
            vec![hit("a", 0.2)],
        ]);

        let ids: Vec<&str> = merged.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(merged[0].score, 0.9);
        assert_eq!(merged[1].score, 0.5);
    }

    #[test]
    fn test_merge_ties_keep_discovery_order() {
        let merged = merge_results(vec![vec![hit("x", 0.3)], vec![hit("y", 0.3), hit("x", 0.3)]]);
        let ids: Vec<&str> = merged.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["x", "y"]);
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_results(Vec::<Vec<RankedHit>>::new()).is_empty());
    }

    #[test]
    fn test_promote_only_mapped_ids() {
        let mut parent_map = ParentMap::new();
        parent_map.insert("a".to_string(), "full parent text".to_string());

        let mut hits = vec![hit("a", 0.9), hit("b", 0.8)];
        let untouched = hits[1].clone();
        promote_parents(&mut hits, &parent_map);

        assert_eq!(hits[0].document.text, "full parent text");
        assert_eq!(
            hits[0].document.metadata[META_REPLACED_WITH_PARENT].as_bool(),
            Some(true)
        );
        assert_eq!(hits[1], untouched);
    }
}
