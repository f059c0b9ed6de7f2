//! Data model shared by the ingestion and search crates

mod document;
mod query;

pub use document::{
    sort_by_score_desc, Document, Filters, Metadata, MetadataValue, RankedHit,
    META_CHUNK_INDEX, META_IS_CHILD, META_PARENT_DOC_ID, META_REPLACED_WITH_PARENT,
};
pub use query::{QueryConfiguration, QueryResponse, SearchOptions};

use std::collections::HashMap;

/// Child chunk id -> enclosing parent window text
pub type ParentMap = HashMap<String, String>;
