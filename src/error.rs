//! Error types for ragtube.

use crate::ingest::IngestStats;
use crate::vector_index::Distance;
use thiserror::Error;

/// Library-level error type for ragtube operations.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(
        "Collection '{collection}' stores {actual}-dimensional vectors but the embedder produces {expected}; \
         recreate the collection explicitly or switch back to the matching embedding model"
    )]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("Collection '{collection}' uses {actual} distance but {expected} was requested")]
    DistanceMismatch {
        collection: String,
        expected: Distance,
        actual: Distance,
    },

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Text generation failed: {0}")]
    Generation(String),

    #[error("Transcript unavailable: {0}")]
    TranscriptUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Ingestion interrupted after {} upserted points: {source}", .stats.upserted)]
    IngestInterrupted {
        stats: Box<IngestStats>,
        #[source]
        source: Box<RagError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl RagError {
    /// Whether a caller-side retry of the same request may succeed.
    ///
    /// Only transient failures of the embedding and generation services
    /// qualify. Configuration and not-found errors never do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RagError::Embedding(_) | RagError::Generation(_))
    }

    /// Whether this error means the requested collection does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RagError::CollectionNotFound(_))
    }
}

/// Result type alias for ragtube operations.
pub type Result<T> = std::result::Result<T, RagError>;
