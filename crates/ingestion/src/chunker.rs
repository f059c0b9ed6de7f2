//! Text chunking module
//!
//! Splits text into fixed character windows. Sizes and overlaps are counted
//! in Unicode scalar values, never bytes, so multi-byte text is never split
//! inside a character.

use crate::errors::ChunkingError;
use ragforge_common::config::ChunkingConfig;
use ragforge_common::models::{
    Document, Metadata, ParentMap, META_CHUNK_INDEX, META_IS_CHILD, META_PARENT_DOC_ID,
};
use tracing::debug;

/// Number of windows [`simple_chunk`] produces for `len` characters
pub fn expected_chunk_count(len: usize, size: usize, overlap: usize) -> usize {
    if len == 0 {
        0
    } else if len <= size {
        1
    } else {
        (len - overlap).div_ceil(size - overlap)
    }
}

/// Split text into windows of `size` characters whose starts advance by
/// `size - overlap`. The last window is the first one that reaches the end
/// of the text.
pub fn simple_chunk(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, ChunkingError> {
    if size == 0 {
        return Err(ChunkingError::ZeroSize);
    }
    if overlap >= size {
        return Err(ChunkingError::OverlapTooLarge { size, overlap });
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut chunks = Vec::with_capacity(expected_chunk_count(total, size, overlap));
    if total == 0 {
        return Ok(chunks);
    }

    let step = size - overlap;
    let mut start = 0;
    loop {
        let end = (start + size).min(total);
        chunks.push(chars[start..end].iter().collect());
        if end == total {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

/// Two-level chunking returning `(child, parent)` pairs.
///
/// Parents are windows of `parent_size` overlapping by `child_size`, so a
/// child never straddles two parents without being wholly inside one of
/// them. Each parent is then split into children of `child_size` with
/// `child_overlap`.
pub fn parent_child_chunk(
    text: &str,
    child_size: usize,
    child_overlap: usize,
    parent_size: usize,
) -> Result<Vec<(String, String)>, ChunkingError> {
    let parents = simple_chunk(text, parent_size, child_size)?;

    let mut pairs = Vec::new();
    for parent in &parents {
        for child in simple_chunk(parent, child_size, child_overlap)? {
            pairs.push((child, parent.clone()));
        }
    }

    debug!(
        chars = text.chars().count(),
        parents = parents.len(),
        children = pairs.len(),
        "Parent-child chunked"
    );
    Ok(pairs)
}

/// Derive child documents for one source document plus their parent map.
///
/// Child ids are `"{doc_id}_child_{i}"` with `i` counting across the whole
/// document. Each child keeps the caller's metadata and adds
/// `parent_doc_id`, `chunk_index` and `is_child`.
pub fn make_parent_child_documents(
    doc_id: &str,
    text: &str,
    metadata: &Metadata,
    config: &ChunkingConfig,
) -> Result<(Vec<Document>, ParentMap), ChunkingError> {
    let pairs = parent_child_chunk(text, config.child_size, config.child_overlap, config.parent_size)?;

    let mut documents = Vec::with_capacity(pairs.len());
    let mut parent_map = ParentMap::with_capacity(pairs.len());

    for (index, (child, parent)) in pairs.into_iter().enumerate() {
        let id = format!("{}_child_{}", doc_id, index);

        let mut child_metadata = metadata.clone();
        child_metadata.insert(META_PARENT_DOC_ID.to_string(), doc_id.into());
        child_metadata.insert(META_CHUNK_INDEX.to_string(), index.into());
        child_metadata.insert(META_IS_CHILD.to_string(), true.into());

        parent_map.insert(id.clone(), parent);
        documents.push(Document {
            id,
            text: child,
            vector: None,
            metadata: child_metadata,
        });
    }

    Ok((documents, parent_map))
}
