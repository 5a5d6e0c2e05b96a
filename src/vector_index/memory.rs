//! In-memory vector index implementation.
//!
//! Useful for testing, dry runs and small datasets.

use super::{
    check_dimension, rank_points, CollectionInfo, Distance, IndexedPoint, RetrievedHit,
    SearchFilter, VectorIndex,
};
use crate::error::{RagError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

struct Collection {
    dimension: usize,
    distance: Distance,
    points: HashMap<Uuid, IndexedPoint>,
}

/// In-memory vector index.
pub struct MemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryIndex {
    /// Create a new, empty in-memory index.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn poisoned<E: std::fmt::Display>(e: E) -> RagError {
        RagError::IndexUnavailable(format!("Failed to acquire lock: {}", e))
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn create_collection(&self, name: &str, dimension: usize, distance: Distance) -> Result<()> {
        let mut collections = self.collections.write().map_err(Self::poisoned)?;
        if collections.contains_key(name) {
            return Err(RagError::InvalidInput(format!("Collection '{}' already exists", name)));
        }
        collections.insert(
            name.to_string(),
            Collection {
                dimension,
                distance,
                points: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let collections = self.collections.read().map_err(Self::poisoned)?;
        Ok(collections.contains_key(name))
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let collections = self.collections.read().map_err(Self::poisoned)?;
        let collection = collections
            .get(name)
            .ok_or_else(|| RagError::CollectionNotFound(name.to_string()))?;
        Ok(CollectionInfo {
            name: name.to_string(),
            dimension: collection.dimension,
            distance: collection.distance,
            points: collection.points.len(),
        })
    }

    async fn upsert(&self, name: &str, points: &[IndexedPoint]) -> Result<usize> {
        let mut collections = self.collections.write().map_err(Self::poisoned)?;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| RagError::CollectionNotFound(name.to_string()))?;

        // Validate everything first so a bad batch writes nothing.
        for point in points {
            check_dimension(name, collection.dimension, &point.vector)?;
        }
        for point in points {
            collection.points.insert(point.id, point.clone());
        }
        Ok(points.len())
    }

    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<RetrievedHit>> {
        let collections = self.collections.read().map_err(Self::poisoned)?;
        let collection = collections
            .get(name)
            .ok_or_else(|| RagError::CollectionNotFound(name.to_string()))?;
        check_dimension(name, collection.dimension, vector)?;

        Ok(rank_points(
            collection.points.values(),
            collection.distance,
            vector,
            limit,
            filter,
        ))
    }

    async fn count(&self, name: &str) -> Result<usize> {
        Ok(self.collection_info(name).await?.points)
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().map_err(Self::poisoned)?;
        collections
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RagError::CollectionNotFound(name.to_string()))
    }
}
