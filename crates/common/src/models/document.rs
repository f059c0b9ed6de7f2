//! Documents, metadata and ranked hits

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata key stamped on child chunks: id of the source document
pub const META_PARENT_DOC_ID: &str = "parent_doc_id";

/// Metadata key stamped on child chunks: sequence index within the source document
pub const META_CHUNK_INDEX: &str = "chunk_index";

/// Metadata key stamped on child chunks
pub const META_IS_CHILD: &str = "is_child";

/// Metadata key set on hits whose text was replaced by the parent window
pub const META_REPLACED_WITH_PARENT: &str = "replaced_with_parent";

/// Scalar metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        MetadataValue::Integer(value as i64)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Ordered document metadata
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Flat equality filters over document metadata
pub type Filters = BTreeMap<String, MetadataValue>;

/// A retrievable unit of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique within one indexing generation
    pub id: String,

    /// Document text
    pub text: String,

    /// Embedding, populated during indexing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,

    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            vector: None,
            metadata: Metadata::new(),
        }
    }

    /// Builder-style metadata insertion
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// True when every filter key is present with an equal value.
    /// An empty filter set matches everything.
    pub fn matches(&self, filters: &Filters) -> bool {
        filters
            .iter()
            .all(|(key, expected)| self.metadata.get(key) == Some(expected))
    }
}

/// A document with a stage-specific score.
///
/// Scores from different stages (similarity, BM25, RRF, relevance) are not
/// comparable with each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedHit {
    pub document: Document,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
}

impl RankedHit {
    pub fn new(document: Document, score: f32) -> Self {
        Self {
            document,
            score,
            rank: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.document.id
    }
}

/// Stable descending sort by score; ties keep their discovery order.
pub fn sort_by_score_desc(hits: &mut [RankedHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_match_on_equality() {
        let doc = Document::new("doc_1", "text")
            .with_metadata("category", "tech")
            .with_metadata("year", 2024_i64);

        let mut filters = Filters::new();
        assert!(doc.matches(&filters));

        filters.insert("category".into(), "tech".into());
        assert!(doc.matches(&filters));

        filters.insert("year".into(), 2023_i64.into());
        assert!(!doc.matches(&filters));
    }

    #[test]
    fn test_metadata_untagged_roundtrip() {
        let doc = Document::new("a", "b")
            .with_metadata("is_child", true)
            .with_metadata("chunk_index", 3_usize)
            .with_metadata("category", "tech");

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["metadata"]["is_child"], serde_json::json!(true));
        assert_eq!(json["metadata"]["chunk_index"], serde_json::json!(3));
        assert!(json.get("vector").is_none());

        let back: Document = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let mut hits = vec![
            RankedHit::new(Document::new("a", ""), 0.5),
            RankedHit::new(Document::new("b", ""), 0.9),
            RankedHit::new(Document::new("c", ""), 0.5),
        ];
        sort_by_score_desc(&mut hits);
        let ids: Vec<&str> = hits.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
