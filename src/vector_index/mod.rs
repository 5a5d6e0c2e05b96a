//! Vector index abstraction for ragtube.
//!
//! Provides a trait-based interface over collection-oriented point stores
//! (Qdrant, SQLite, in-memory) plus the data model shared by all backends.

mod manager;
mod memory;
mod qdrant;
mod sqlite;

pub use manager::{CollectionStatus, IndexManager};
pub use memory::MemoryIndex;
pub use qdrant::QdrantIndex;
pub use sqlite::SqliteIndex;

use crate::error::{RagError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Distance metric of a collection.
///
/// Scores are always "higher is more relevant": `Cosine` is the cosine
/// similarity in `[-1, 1]`, `Dot` the raw dot product, and `Euclid` the
/// euclidean distance as reported by the backend (Qdrant orders it
/// ascending; local backends negate it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
    Dot,
    Euclid,
}

impl std::str::FromStr for Distance {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Distance::Cosine),
            "dot" => Ok(Distance::Dot),
            "euclid" | "euclidean" => Ok(Distance::Euclid),
            _ => Err(format!("Unknown distance metric: {}", s)),
        }
    }
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Distance::Cosine => write!(f, "Cosine"),
            Distance::Dot => write!(f, "Dot"),
            Distance::Euclid => write!(f, "Euclid"),
        }
    }
}

/// Source-level metadata replicated into every chunk of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub channel_title: Option<String>,
    pub published_at: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    /// Duration in seconds.
    pub duration: Option<u64>,
    pub description: Option<String>,
    /// Any other key supplied by the caller.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Self-sufficient payload stored with every point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub doc_id: String,
    pub source: String,
    pub source_url: String,
    pub title: String,
    pub text: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub tags: BTreeSet<String>,
    pub importance: f32,
    pub metadata: DocumentMetadata,
    /// `<doc_id>_<chunk_index>`, for humans reading the index.
    pub external_id: String,
}

/// The unit stored in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// A search hit in the index's native rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedHit {
    pub id: Uuid,
    /// Similarity under the collection's distance metric (higher is better).
    pub score: f32,
    pub payload: ChunkPayload,
}

/// Conjunction of payload predicates. An empty filter matches every point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Each tag must be present in the point's `tags`.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Inclusive lower bound on `importance`.
    #[serde(default)]
    pub min_importance: Option<f32>,
    /// Exact `doc_id` match.
    #[serde(default)]
    pub doc_id: Option<String>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_min_importance(mut self, min_importance: f32) -> Self {
        self.min_importance = Some(min_importance);
        self
    }

    pub fn with_doc_id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.min_importance.is_none() && self.doc_id.is_none()
    }

    /// Evaluate the filter against a payload (used by the local backends).
    pub fn matches(&self, payload: &ChunkPayload) -> bool {
        if !self.tags.iter().all(|t| payload.tags.contains(t)) {
            return false;
        }
        if let Some(min) = self.min_importance {
            if payload.importance < min {
                return false;
            }
        }
        if let Some(doc_id) = &self.doc_id {
            if &payload.doc_id != doc_id {
                return false;
            }
        }
        true
    }
}

/// Shape and size of an existing collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub dimension: usize,
    pub distance: Distance,
    pub points: usize,
}

/// Trait for vector index implementations.
///
/// Operations on a missing collection fail with
/// [`RagError::CollectionNotFound`]; transport failures surface as
/// [`RagError::IndexUnavailable`] and are never retried here.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create a collection. Fails if it already exists.
    async fn create_collection(&self, name: &str, dimension: usize, distance: Distance) -> Result<()>;

    /// Check whether a collection exists.
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Describe an existing collection.
    async fn collection_info(&self, name: &str) -> Result<CollectionInfo>;

    /// Insert or overwrite points by id. Returns the number of points written.
    async fn upsert(&self, name: &str, points: &[IndexedPoint]) -> Result<usize>;

    /// Nearest-neighbour search, best hit first.
    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<RetrievedHit>>;

    /// Number of points in a collection.
    async fn count(&self, name: &str) -> Result<usize>;

    /// Delete a collection and all of its points.
    async fn drop_collection(&self, name: &str) -> Result<()>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Similarity of two equally sized vectors under `distance`, higher is better.
pub fn similarity(distance: Distance, a: &[f32], b: &[f32]) -> f32 {
    match distance {
        Distance::Cosine => cosine_similarity(a, b),
        Distance::Dot => a.iter().zip(b.iter()).map(|(x, y)| x * y).sum(),
        Distance::Euclid => -a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
    }
}

/// Reject vectors whose length differs from the collection's dimension.
pub(crate) fn check_dimension(collection: &str, expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(RagError::DimensionMismatch {
            collection: collection.to_string(),
            expected: vector.len(),
            actual: expected,
        });
    }
    Ok(())
}

/// Score, filter, rank and truncate points held by a local backend.
pub(crate) fn rank_points<'a, I>(
    points: I,
    distance: Distance,
    query: &[f32],
    limit: usize,
    filter: &SearchFilter,
) -> Vec<RetrievedHit>
where
    I: Iterator<Item = &'a IndexedPoint>,
{
    let mut hits: Vec<RetrievedHit> = points
        .filter(|p| filter.matches(&p.payload))
        .map(|p| RetrievedHit {
            id: p.id,
            score: similarity(distance, query, &p.vector),
            payload: p.payload.clone(),
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);
    hits
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A payload with sensible defaults for index tests.
    pub fn payload(doc_id: &str, chunk_index: usize, text: &str, importance: f32) -> ChunkPayload {
        ChunkPayload {
            doc_id: doc_id.to_string(),
            source: "youtube".to_string(),
            source_url: format!("https://youtu.be/{}", doc_id.trim_start_matches("yt_")),
            title: format!("Video {}", doc_id),
            text: text.to_string(),
            chunk_index,
            total_chunks: 1,
            start_char: 0,
            end_char: text.chars().count(),
            tags: ["youtube".to_string()].into_iter().collect(),
            importance,
            metadata: DocumentMetadata::default(),
            external_id: crate::identity::external_id(doc_id, chunk_index),
        }
    }

    pub fn point(doc_id: &str, chunk_index: usize, vector: Vec<f32>, importance: f32) -> IndexedPoint {
        IndexedPoint {
            id: crate::identity::point_id(doc_id, chunk_index),
            vector,
            payload: payload(doc_id, chunk_index, "text", importance),
        }
    }
}
