//! Semantic search over an indexed collection.

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::vector_index::{RetrievedHit, SearchFilter, VectorIndex};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Per-call replacements for the searcher's configured collaborators.
///
/// Every field that is set takes precedence over the searcher's own value
/// for that call only.
#[derive(Clone, Default)]
pub struct SearchOverrides {
    pub collection: Option<String>,
    pub embedder: Option<Arc<dyn Embedder>>,
}

impl SearchOverrides {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Embeds queries and searches one collection.
pub struct Searcher {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    collection: String,
}

impl Searcher {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>, collection: impl Into<String>) -> Self {
        Self {
            index,
            embedder,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Top `top_k` hits for `query`, best first. `top_k == 0` yields no hits.
    pub async fn search(&self, query: &str, top_k: usize, filter: &SearchFilter) -> Result<Vec<RetrievedHit>> {
        self.search_with(query, top_k, filter, &SearchOverrides::default())
            .await
    }

    /// Like [`Searcher::search`], with per-call overrides.
    ///
    /// The query embedding must have the collection's dimensionality; a
    /// mismatch surfaces as [`RagError::DimensionMismatch`] from the index.
    #[instrument(skip(self, query, filter, overrides))]
    pub async fn search_with(
        &self,
        query: &str,
        top_k: usize,
        filter: &SearchFilter,
        overrides: &SearchOverrides,
    ) -> Result<Vec<RetrievedHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::InvalidInput("query must not be empty".into()));
        }

        let collection = overrides.collection.as_deref().unwrap_or(&self.collection);
        let embedder = overrides.embedder.as_ref().unwrap_or(&self.embedder);

        let vector = embedder.embed(query).await?;
        let hits = self.index.search(collection, &vector, top_k, filter).await?;
        debug!("Found {} hits in '{}'", hits.len(), collection);
        Ok(hits)
    }
}
