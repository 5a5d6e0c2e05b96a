//! Qdrant-backed vector index over the gRPC client.
//!
//! Payloads are stored as plain key/value structures mirroring
//! [`ChunkPayload`], so the collection stays readable from the Qdrant
//! dashboard and other clients.

use super::{ChunkPayload, CollectionInfo, Distance, IndexedPoint, RetrievedHit, SearchFilter, VectorIndex};
use crate::error::{RagError, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    vectors_config, Condition, CountPointsBuilder, CreateCollectionBuilder, Distance as QdrantDistance,
    Filter, ListValue, PointStruct, QueryPointsBuilder, Range, ScoredPoint, Struct,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Qdrant, QdrantError};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

/// Default timeout for Qdrant requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Qdrant client scoped to the operations ragtube needs.
pub struct QdrantIndex {
    client: Qdrant,
}

fn unavailable(what: &str, e: QdrantError) -> RagError {
    RagError::IndexUnavailable(format!("Qdrant {} failed: {}", what, e))
}

fn to_qdrant_distance(distance: Distance) -> QdrantDistance {
    match distance {
        Distance::Cosine => QdrantDistance::Cosine,
        Distance::Dot => QdrantDistance::Dot,
        Distance::Euclid => QdrantDistance::Euclid,
    }
}

fn from_qdrant_distance(distance: QdrantDistance) -> Result<Distance> {
    match distance {
        QdrantDistance::Cosine => Ok(Distance::Cosine),
        QdrantDistance::Dot => Ok(Distance::Dot),
        QdrantDistance::Euclid => Ok(Distance::Euclid),
        other => Err(RagError::IndexUnavailable(format!(
            "Unsupported Qdrant distance: {:?}",
            other
        ))),
    }
}

fn json_to_qdrant(value: JsonValue) -> QdrantValue {
    let kind = match value {
        JsonValue::Null => Kind::NullValue(0),
        JsonValue::Bool(b) => Kind::BoolValue(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Kind::IntegerValue(i),
            None => Kind::DoubleValue(n.as_f64().unwrap_or_default()),
        },
        JsonValue::String(s) => Kind::StringValue(s),
        JsonValue::Array(values) => Kind::ListValue(ListValue {
            values: values.into_iter().map(json_to_qdrant).collect(),
        }),
        JsonValue::Object(map) => Kind::StructValue(Struct {
            fields: map.into_iter().map(|(k, v)| (k, json_to_qdrant(v))).collect(),
        }),
    };
    QdrantValue { kind: Some(kind) }
}

fn qdrant_to_json(value: QdrantValue) -> JsonValue {
    match value.kind {
        None | Some(Kind::NullValue(_)) => JsonValue::Null,
        Some(Kind::BoolValue(b)) => JsonValue::Bool(b),
        Some(Kind::IntegerValue(i)) => JsonValue::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Some(Kind::StringValue(s)) => JsonValue::String(s),
        Some(Kind::ListValue(list)) => JsonValue::Array(list.values.into_iter().map(qdrant_to_json).collect()),
        Some(Kind::StructValue(st)) => JsonValue::Object(
            st.fields
                .into_iter()
                .map(|(k, v)| (k, qdrant_to_json(v)))
                .collect(),
        ),
    }
}

impl QdrantIndex {
    /// Create a client for the Qdrant gRPC endpoint at `url` (e.g. `http://localhost:6334`).
    ///
    /// The connection is established lazily on the first request.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self> {
        Url::parse(url).map_err(|e| RagError::Config(format!("Invalid Qdrant URL '{}': {}", url, e)))?;

        let mut builder = Qdrant::from_url(url).timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder
            .build()
            .map_err(|e| RagError::Config(format!("Qdrant client setup failed: {}", e)))?;

        Ok(Self { client })
    }

    /// Turn a failed collection operation into `CollectionNotFound` when the
    /// collection is gone, `IndexUnavailable` otherwise.
    async fn collection_error(&self, name: &str, what: &str, e: QdrantError) -> RagError {
        match self.collection_exists(name).await {
            Ok(false) => RagError::CollectionNotFound(name.to_string()),
            _ => unavailable(what, e),
        }
    }

    fn to_point(point: &IndexedPoint) -> Result<PointStruct> {
        let payload: HashMap<String, QdrantValue> = match serde_json::to_value(&point.payload)? {
            JsonValue::Object(map) => map.into_iter().map(|(k, v)| (k, json_to_qdrant(v))).collect(),
            other => {
                return Err(RagError::IndexUnavailable(format!(
                    "Payload must serialize to an object, got {}",
                    other
                )))
            }
        };
        Ok(PointStruct::new(point.id.to_string(), point.vector.clone(), payload))
    }

    fn to_hit(point: ScoredPoint) -> Result<RetrievedHit> {
        let id = match point.id.and_then(|id| id.point_id_options) {
            Some(PointIdOptions::Uuid(s)) => Uuid::parse_str(&s)
                .map_err(|e| RagError::IndexUnavailable(format!("Unexpected point id '{}': {}", s, e)))?,
            other => {
                return Err(RagError::IndexUnavailable(format!(
                    "Unexpected point id: {:?}",
                    other
                )))
            }
        };

        let fields = point
            .payload
            .into_iter()
            .map(|(k, v)| (k, qdrant_to_json(v)))
            .collect::<serde_json::Map<_, _>>();
        let payload: ChunkPayload = serde_json::from_value(JsonValue::Object(fields))
            .map_err(|e| RagError::IndexUnavailable(format!("Malformed payload for point {}: {}", id, e)))?;

        Ok(RetrievedHit {
            id,
            score: point.score,
            payload,
        })
    }

    /// Translate a filter into Qdrant `must` conditions.
    fn to_filter(filter: &SearchFilter) -> Option<Filter> {
        if filter.is_empty() {
            return None;
        }
        let mut must = Vec::new();
        for tag in &filter.tags {
            must.push(Condition::matches("tags", tag.clone()));
        }
        if let Some(min) = filter.min_importance {
            must.push(Condition::range(
                "importance",
                Range {
                    gte: Some(f64::from(min)),
                    ..Default::default()
                },
            ));
        }
        if let Some(doc_id) = &filter.doc_id {
            must.push(Condition::matches("doc_id", doc_id.clone()));
        }
        Some(Filter::must(must))
    }

    fn to_info(name: &str, info: qdrant_client::qdrant::CollectionInfo) -> Result<CollectionInfo> {
        let vectors = info
            .config
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);
        let params = match vectors {
            Some(vectors_config::Config::Params(params)) => params,
            Some(vectors_config::Config::ParamsMap(_)) => {
                return Err(RagError::IndexUnavailable(format!(
                    "Collection '{}' uses named vectors",
                    name
                )))
            }
            None => {
                return Err(RagError::IndexUnavailable(format!(
                    "Collection '{}' has no vector parameters",
                    name
                )))
            }
        };

        Ok(CollectionInfo {
            name: name.to_string(),
            dimension: params.size as usize,
            distance: from_qdrant_distance(params.distance())?,
            points: info.points_count.unwrap_or_default() as usize,
        })
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    #[instrument(skip(self))]
    async fn create_collection(&self, name: &str, dimension: usize, distance: Distance) -> Result<()> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, to_qdrant_distance(distance))),
            )
            .await
            .map_err(|e| unavailable("create collection", e))?;
        info!("Created collection '{}' (dim={}, distance={})", name, dimension, distance);
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        match self.client.collection_exists(name).await {
            Ok(exists) => Ok(exists),
            Err(e) => {
                // Servers before 1.8 lack the exists call; listing works everywhere.
                debug!("Collection exists check failed ({}), listing collections", e);
                let listed = self
                    .client
                    .list_collections()
                    .await
                    .map_err(|e| unavailable("list collections", e))?;
                Ok(listed.collections.iter().any(|c| c.name == name))
            }
        }
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let response = match self.client.collection_info(name).await {
            Ok(response) => response,
            Err(e) => return Err(self.collection_error(name, "collection info", e).await),
        };
        let info = response
            .result
            .ok_or_else(|| RagError::CollectionNotFound(name.to_string()))?;
        let points_known = info.points_count.is_some();
        let mut described = Self::to_info(name, info)?;
        if !points_known {
            described.points = self.count(name).await?;
        }
        Ok(described)
    }

    #[instrument(skip(self, points), fields(count = points.len()))]
    async fn upsert(&self, name: &str, points: &[IndexedPoint]) -> Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }
        let structs = points.iter().map(Self::to_point).collect::<Result<Vec<_>>>()?;
        if let Err(e) = self
            .client
            .upsert_points(UpsertPointsBuilder::new(name, structs).wait(true))
            .await
        {
            return Err(self.collection_error(name, "upsert", e).await);
        }
        debug!("Upserted {} points into '{}'", points.len(), name);
        Ok(points.len())
    }

    #[instrument(skip(self, vector, filter))]
    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<RetrievedHit>> {
        let mut query = QueryPointsBuilder::new(name)
            .query(vector.to_vec())
            .limit(limit as u64)
            .with_payload(true);
        if let Some(filter) = Self::to_filter(filter) {
            query = query.filter(filter);
        }

        let response = match self.client.query(query).await {
            Ok(response) => response,
            Err(e) => return Err(self.collection_error(name, "search", e).await),
        };
        response.result.into_iter().map(Self::to_hit).collect()
    }

    async fn count(&self, name: &str) -> Result<usize> {
        let response = match self.client.count(CountPointsBuilder::new(name).exact(true)).await {
            Ok(response) => response,
            Err(e) => return Err(self.collection_error(name, "count", e).await),
        };
        Ok(response.result.map(|c| c.count as usize).unwrap_or(0))
    }

    #[instrument(skip(self))]
    async fn drop_collection(&self, name: &str) -> Result<()> {
        // Qdrant reports unknown collections as a successful no-op.
        if !self.collection_exists(name).await? {
            return Err(RagError::CollectionNotFound(name.to_string()));
        }
        let response = self
            .client
            .delete_collection(name)
            .await
            .map_err(|e| unavailable("delete collection", e))?;
        if !response.result {
            warn!("Qdrant did not confirm deletion of '{}'", name);
        }
        info!("Dropped collection '{}'", name);
        Ok(())
    }
}
