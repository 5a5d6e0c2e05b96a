//! Deterministic point identifiers.
//!
//! A point id depends only on `(doc_id, chunk_index)`, so re-ingesting a
//! document with the same chunking parameters overwrites its points instead
//! of duplicating them.

use uuid::Uuid;

/// Name-based (v5) UUID of chunk `chunk_index` of document `doc_id`.
pub fn point_id(doc_id: &str, chunk_index: usize) -> Uuid {
    let name = format!("{}::{}", doc_id, chunk_index);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
}

/// Human readable counterpart of [`point_id`], stored in the payload for debugging.
pub fn external_id(doc_id: &str, chunk_index: usize) -> String {
    format!("{}_{}", doc_id, chunk_index)
}
