//! Collection lifecycle management.

use super::{CollectionInfo, Distance, VectorIndex};
use crate::error::{RagError, Result};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome of [`IndexManager::create_if_missing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    /// The collection was created by this call.
    Created,
    /// A compatible collection already existed.
    Existing,
}

/// Ensures collections exist with the expected shape.
pub struct IndexManager {
    index: Arc<dyn VectorIndex>,
}

impl IndexManager {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    /// Create `collection` unless it exists.
    ///
    /// An existing collection must match `dimension` and `distance`;
    /// otherwise this fails with a configuration error and leaves the
    /// collection untouched. Recreating it is an explicit, destructive
    /// decision left to the caller.
    #[instrument(skip(self))]
    pub async fn create_if_missing(
        &self,
        collection: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<CollectionStatus> {
        if self.index.collection_exists(collection).await? {
            let info = self.index.collection_info(collection).await?;
            if info.dimension != dimension {
                return Err(RagError::DimensionMismatch {
                    collection: collection.to_string(),
                    expected: dimension,
                    actual: info.dimension,
                });
            }
            if info.distance != distance {
                return Err(RagError::DistanceMismatch {
                    collection: collection.to_string(),
                    expected: distance,
                    actual: info.distance,
                });
            }
            info!("Collection '{}' already exists ({} points)", collection, info.points);
            return Ok(CollectionStatus::Existing);
        }

        self.index.create_collection(collection, dimension, distance).await?;
        info!("Created collection '{}' (dim={}, distance={})", collection, dimension, distance);
        Ok(CollectionStatus::Created)
    }

    /// Drop `collection` if present and create it again, empty.
    #[instrument(skip(self))]
    pub async fn recreate(&self, collection: &str, dimension: usize, distance: Distance) -> Result<()> {
        if self.index.collection_exists(collection).await? {
            warn!("Recreating collection '{}': all of its points will be lost", collection);
            self.index.drop_collection(collection).await?;
        }
        self.index.create_collection(collection, dimension, distance).await?;
        info!("Recreated collection '{}'", collection);
        Ok(())
    }

    /// Drop `collection`. Fails with `CollectionNotFound` if it does not exist.
    #[instrument(skip(self))]
    pub async fn drop(&self, collection: &str) -> Result<()> {
        self.index.drop_collection(collection).await?;
        info!("Dropped collection '{}'", collection);
        Ok(())
    }

    /// Describe `collection`.
    pub async fn info(&self, collection: &str) -> Result<CollectionInfo> {
        self.index.collection_info(collection).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::point;
    use super::super::MemoryIndex;
    use super::*;

    fn manager() -> (Arc<MemoryIndex>, IndexManager) {
        let index = Arc::new(MemoryIndex::new());
        (index.clone(), IndexManager::new(index))
    }

    #[tokio::test]
    async fn test_create_if_missing_is_idempotent() {
        let (index, manager) = manager();
        assert_eq!(
            manager.create_if_missing("videos", 2, Distance::Cosine).await.unwrap(),
            CollectionStatus::Created
        );
        index.upsert("videos", &[point("yt_a", 0, vec![1.0, 0.0], 1.0)]).await.unwrap();
        assert_eq!(
            manager.create_if_missing("videos", 2, Distance::Cosine).await.unwrap(),
            CollectionStatus::Existing
        );
        assert_eq!(index.count("videos").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_fatal() {
        let (index, manager) = manager();
        manager.create_if_missing("videos", 384, Distance::Cosine).await.unwrap();
        index
            .upsert("videos", &[point("yt_a", 0, vec![0.1; 384], 1.0)])
            .await
            .unwrap();

        let err = manager
            .create_if_missing("videos", 1536, Distance::Cosine)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch { expected: 1536, actual: 384, .. }
        ));
        // Nothing was recreated behind the caller's back.
        assert_eq!(index.count("videos").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_distance_mismatch_is_fatal() {
        let (_, manager) = manager();
        manager.create_if_missing("videos", 2, Distance::Dot).await.unwrap();
        let err = manager
            .create_if_missing("videos", 2, Distance::Cosine)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::DistanceMismatch { .. }));
    }

    #[tokio::test]
    async fn test_recreate_empties_collection() {
        let (index, manager) = manager();
        manager.create_if_missing("videos", 2, Distance::Cosine).await.unwrap();
        index.upsert("videos", &[point("yt_a", 0, vec![1.0, 0.0], 1.0)]).await.unwrap();

        manager.recreate("videos", 3, Distance::Cosine).await.unwrap();
        let info = manager.info("videos").await.unwrap();
        assert_eq!(info.points, 0);
        assert_eq!(info.dimension, 3);

        // Recreate also works when nothing exists yet.
        manager.recreate("fresh", 2, Distance::Cosine).await.unwrap();
        assert!(index.collection_exists("fresh").await.unwrap());
    }

    #[tokio::test]
    async fn test_drop_surfaces_not_found() {
        let (_, manager) = manager();
        let err = manager.drop("missing").await.unwrap_err();
        assert!(matches!(err, RagError::CollectionNotFound(name) if name == "missing"));
    }
}
