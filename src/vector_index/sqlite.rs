//! SQLite-based vector index implementation.
//!
//! Uses SQLite for persistence with similarity computed in Rust. Every
//! search scans the whole collection, which is fine for a personal video
//! library; use the Qdrant backend for large corpora.

use super::{
    check_dimension, rank_points, CollectionInfo, Distance, IndexedPoint, RetrievedHit,
    SearchFilter, VectorIndex,
};
use crate::error::{RagError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS collections (
        name TEXT PRIMARY KEY,
        dimension INTEGER NOT NULL,
        distance TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS points (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        doc_id TEXT NOT NULL,
        vector BLOB NOT NULL,
        payload TEXT NOT NULL,
        indexed_at TEXT NOT NULL,
        PRIMARY KEY (collection, id)
    );

    CREATE INDEX IF NOT EXISTS idx_points_doc_id ON points(collection, doc_id);
"#;

/// SQLite-based vector index.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    /// Open (or create) an index database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite index (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RagError::IndexUnavailable(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize a vector to little-endian bytes.
    fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
        vector.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize a vector from little-endian bytes.
    fn bytes_to_vector(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    /// Dimension and distance of a collection, `None` if it does not exist.
    fn collection_meta(conn: &Connection, name: &str) -> Result<Option<(usize, Distance)>> {
        let row = conn
            .query_row(
                "SELECT dimension, distance FROM collections WHERE name = ?1",
                params![name],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        match row {
            Some((dimension, distance)) => {
                let distance = distance.parse::<Distance>().map_err(|e| {
                    RagError::IndexUnavailable(format!("Corrupt metadata for '{}': {}", name, e))
                })?;
                Ok(Some((dimension as usize, distance)))
            }
            None => Ok(None),
        }
    }

    fn require_collection(conn: &Connection, name: &str) -> Result<(usize, Distance)> {
        Self::collection_meta(conn, name)?
            .ok_or_else(|| RagError::CollectionNotFound(name.to_string()))
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    #[instrument(skip(self))]
    async fn create_collection(&self, name: &str, dimension: usize, distance: Distance) -> Result<()> {
        let conn = self.lock()?;
        if Self::collection_meta(&conn, name)?.is_some() {
            return Err(RagError::InvalidInput(format!("Collection '{}' already exists", name)));
        }
        conn.execute(
            "INSERT INTO collections (name, dimension, distance, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![name, dimension as i64, distance.to_string(), Utc::now().to_rfc3339()],
        )?;
        info!("Created collection '{}' (dim={}, distance={})", name, dimension, distance);
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let conn = self.lock()?;
        Ok(Self::collection_meta(&conn, name)?.is_some())
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let conn = self.lock()?;
        let (dimension, distance) = Self::require_collection(&conn, name)?;
        let points: i64 = conn.query_row(
            "SELECT COUNT(*) FROM points WHERE collection = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(CollectionInfo {
            name: name.to_string(),
            dimension,
            distance,
            points: points as usize,
        })
    }

    #[instrument(skip(self, points), fields(count = points.len()))]
    async fn upsert(&self, name: &str, points: &[IndexedPoint]) -> Result<usize> {
        let conn = self.lock()?;
        let (dimension, _) = Self::require_collection(&conn, name)?;
        for point in points {
            check_dimension(name, dimension, &point.vector)?;
        }

        let tx = conn.unchecked_transaction()?;
        let indexed_at = Utc::now().to_rfc3339();

        for point in points {
            let payload = serde_json::to_string(&point.payload)?;
            tx.execute(
                r#"
                INSERT OR REPLACE INTO points (collection, id, doc_id, vector, payload, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    name,
                    point.id.to_string(),
                    point.payload.doc_id,
                    Self::vector_to_bytes(&point.vector),
                    payload,
                    indexed_at,
                ],
            )?;
        }

        tx.commit()?;
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
        let conn = self.lock()?;
        let (dimension, distance) = Self::require_collection(&conn, name)?;
        check_dimension(name, dimension, vector)?;

        // doc_id is indexed, so push that predicate into SQL.
        let mut stmt = conn.prepare(
            r#"
            SELECT id, vector, payload FROM points
            WHERE collection = ?1 AND (?2 IS NULL OR doc_id = ?2)
            "#,
        )?;

        let rows = stmt.query_map(params![name, filter.doc_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut points = Vec::new();
        for row in rows {
            let (id, vector_bytes, payload) = row?;
            points.push(IndexedPoint {
                id: uuid::Uuid::parse_str(&id).map_err(|e| {
                    RagError::IndexUnavailable(format!("Corrupt point id '{}': {}", id, e))
                })?,
                vector: Self::bytes_to_vector(&vector_bytes),
                payload: serde_json::from_str(&payload)?,
            });
        }

        let hits = rank_points(points.iter(), distance, vector, limit, filter);
        debug!("Found {} matching points", hits.len());
        Ok(hits)
    }

    async fn count(&self, name: &str) -> Result<usize> {
        Ok(self.collection_info(name).await?.points)
    }

    #[instrument(skip(self))]
    async fn drop_collection(&self, name: &str) -> Result<()> {
        let conn = self.lock()?;
        Self::require_collection(&conn, name)?;

        let tx = conn.unchecked_transaction()?;
        let deleted = tx.execute("DELETE FROM points WHERE collection = ?1", params![name])?;
        tx.execute("DELETE FROM collections WHERE name = ?1", params![name])?;
        tx.commit()?;

        info!("Dropped collection '{}' ({} points)", name, deleted);
        Ok(())
    }
}
