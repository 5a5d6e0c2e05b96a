//! Batch ingestion of documents into a collection.
//!
//! Documents are chunked, embedded in batches, scored, given deterministic
//! ids and accumulated into an upsert buffer that is flushed whenever it
//! reaches the configured size, plus once more at the end. Embedding calls
//! for different batches and documents run concurrently up to `workers`;
//! the buffer itself is owned by a single consumer, which sees documents in
//! input order and flushes sequentially.

use crate::chunking::{normalize_text, Chunk, TextChunker};
use crate::config::IngestionSettings;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::identity::{external_id, point_id};
use crate::scoring::ImportanceScorer;
use crate::vector_index::{ChunkPayload, DocumentMetadata, IndexedPoint, VectorIndex};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

/// Tags given to YouTube transcripts unless the caller says otherwise.
pub const DEFAULT_TAGS: [&str; 2] = ["youtube", "transcript"];

/// Channel recorded when a video's channel is not known.
pub const UNKNOWN_CHANNEL: &str = "UnknownChannel";

/// A document to ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub doc_id: String,
    pub source: String,
    pub source_url: String,
    pub title: String,
    pub text: String,
    pub tags: BTreeSet<String>,
    pub metadata: DocumentMetadata,
}

impl SourceDocument {
    /// A YouTube transcript, with the conventional id, URL and defaults.
    pub fn youtube(video_id: &str, title: Option<&str>, text: impl Into<String>) -> Self {
        let doc_id = format!("yt_{}", video_id);
        let title = title
            .map(str::to_string)
            .unwrap_or_else(|| format!("Video {}", video_id));
        let metadata = DocumentMetadata {
            channel_title: Some(UNKNOWN_CHANNEL.to_string()),
            description: Some(format!("Transcript for {} ({})", doc_id, title)),
            ..Default::default()
        };

        Self {
            source_url: format!("https://youtu.be/{}", video_id),
            source: "youtube".to_string(),
            doc_id,
            title,
            text: text.into(),
            tags: DEFAULT_TAGS.iter().map(|t| t.to_string()).collect(),
            metadata,
        }
    }

    /// Replace the tag set.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Merge `metadata` over the current metadata; fields it leaves unset are kept.
    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        let current = &mut self.metadata;
        current.channel_title = metadata.channel_title.or(current.channel_title.take());
        current.published_at = metadata.published_at.or(current.published_at.take());
        current.view_count = metadata.view_count.or(current.view_count);
        current.like_count = metadata.like_count.or(current.like_count);
        current.duration = metadata.duration.or(current.duration);
        current.description = metadata.description.or(current.description.take());
        current.extra.extend(metadata.extra);
        self
    }
}

/// Batching and concurrency knobs for one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    /// Chunks per embedding call.
    pub batch_size_embed: usize,
    /// Points per upsert call.
    pub batch_size_upsert: usize,
    /// Concurrent embedding calls.
    pub workers: usize,
    /// Chunk and embed, but never write to the index.
    pub dry_run: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::from(&IngestionSettings::default())
    }
}

impl From<&IngestionSettings> for IngestOptions {
    fn from(settings: &IngestionSettings) -> Self {
        Self {
            batch_size_embed: settings.batch_size_embed,
            batch_size_upsert: settings.batch_size_upsert,
            workers: settings.workers,
            dry_run: false,
        }
    }
}

impl IngestOptions {
    fn validate(&self) -> Result<()> {
        if self.batch_size_embed == 0 || self.batch_size_upsert == 0 || self.workers == 0 {
            return Err(RagError::InvalidInput(
                "batch sizes and worker count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// A document whose embeddings could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentFailure {
    pub doc_id: String,
    pub error: String,
}

/// Aggregate outcome of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
    /// Documents whose chunks were all embedded.
    pub documents: usize,
    /// Chunks successfully embedded.
    pub chunks: usize,
    /// Points written to the index. Equals `chunks` after a successful,
    /// non-dry run.
    pub upserted: usize,
    /// Documents that produced no chunks.
    pub skipped: usize,
    pub failed: Vec<DocumentFailure>,
    pub elapsed: Duration,
}

enum Embedded {
    Empty,
    Points(Vec<IndexedPoint>),
    Failed(RagError),
}

/// Turns documents into points in one collection.
pub struct Ingestor {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    chunker: TextChunker,
    scorer: ImportanceScorer,
    collection: String,
}

impl Ingestor {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        chunker: TextChunker,
        scorer: ImportanceScorer,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            index,
            embedder,
            chunker,
            scorer,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Ingest `documents` into the collection, which must already exist.
    ///
    /// A document whose embedding fails is recorded in `failed` and nothing
    /// of it is written; the run continues. A failed upsert stops the run
    /// with [`RagError::IngestInterrupted`], carrying the stats of what was
    /// committed before it. Re-running is safe: ids are deterministic.
    #[instrument(skip(self, documents, options), fields(collection = %self.collection, count = documents.len()))]
    pub async fn ingest(&self, documents: &[SourceDocument], options: &IngestOptions) -> Result<IngestStats> {
        options.validate()?;
        let started = Instant::now();
        let mut stats = IngestStats::default();
        let permits = &Semaphore::new(options.workers);

        let mut prepared = stream::iter(documents)
            .map(|doc| async move { (doc, self.embed_document(doc, options, permits).await) })
            .buffered(options.workers);

        let mut buffer: Vec<IndexedPoint> = Vec::with_capacity(options.batch_size_upsert);
        while let Some((doc, outcome)) = prepared.next().await {
            match outcome {
                Embedded::Empty => {
                    debug!("Skipping '{}': no chunks", doc.doc_id);
                    stats.skipped += 1;
                }
                Embedded::Failed(e) => {
                    warn!("Embedding failed for '{}': {}", doc.doc_id, e);
                    stats.failed.push(DocumentFailure {
                        doc_id: doc.doc_id.clone(),
                        error: e.to_string(),
                    });
                }
                Embedded::Points(points) => {
                    debug!("Prepared {} points for '{}'", points.len(), doc.doc_id);
                    stats.documents += 1;
                    stats.chunks += points.len();
                    buffer.extend(points);
                    while buffer.len() >= options.batch_size_upsert {
                        let batch: Vec<IndexedPoint> = buffer.drain(..options.batch_size_upsert).collect();
                        self.flush(&batch, options, &mut stats, started).await?;
                    }
                }
            }
        }

        // The tail is usually smaller than a full batch and must still land.
        self.flush(&buffer, options, &mut stats, started).await?;

        stats.elapsed = started.elapsed();
        info!(
            "Ingested {} documents: {} chunks, {} upserted, {} skipped, {} failed",
            stats.documents,
            stats.chunks,
            stats.upserted,
            stats.skipped,
            stats.failed.len()
        );
        Ok(stats)
    }

    /// Chunk, embed and build the points of one document.
    async fn embed_document(&self, doc: &SourceDocument, options: &IngestOptions, permits: &Semaphore) -> Embedded {
        let normalized = normalize_text(&doc.text);
        let chunks = self.chunker.chunk(&normalized);
        if chunks.is_empty() {
            return Embedded::Empty;
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let batches: Result<Vec<Vec<Vec<f32>>>> = stream::iter(texts.chunks(options.batch_size_embed))
            .map(|batch| async move {
                let _permit = permits
                    .acquire()
                    .await
                    .map_err(|e| RagError::Embedding(e.to_string()))?;
                self.embedder.embed_batch(batch).await
            })
            .buffered(options.workers)
            .try_collect()
            .await;

        let vectors: Vec<Vec<f32>> = match batches {
            Ok(batches) => batches.into_iter().flatten().collect(),
            Err(e) => return Embedded::Failed(e),
        };
        if vectors.len() != chunks.len() {
            return Embedded::Failed(RagError::Embedding(format!(
                "Malformed embedding response: expected {} vectors, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let total_chunks = chunks.len();
        let points = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(chunk_index, (chunk, vector))| self.build_point(doc, chunk_index, total_chunks, chunk, vector))
            .collect();
        Embedded::Points(points)
    }

    fn build_point(
        &self,
        doc: &SourceDocument,
        chunk_index: usize,
        total_chunks: usize,
        chunk: Chunk,
        vector: Vec<f32>,
    ) -> IndexedPoint {
        let importance = self.scorer.score(&chunk.text);
        IndexedPoint {
            id: point_id(&doc.doc_id, chunk_index),
            vector,
            payload: ChunkPayload {
                doc_id: doc.doc_id.clone(),
                source: doc.source.clone(),
                source_url: doc.source_url.clone(),
                title: doc.title.clone(),
                text: chunk.text,
                chunk_index,
                total_chunks,
                start_char: chunk.start_char,
                end_char: chunk.end_char,
                tags: doc.tags.clone(),
                importance,
                metadata: doc.metadata.clone(),
                external_id: external_id(&doc.doc_id, chunk_index),
            },
        }
    }

    /// Write one batch of at most `batch_size_upsert` points in a single upsert.
    async fn flush(
        &self,
        batch: &[IndexedPoint],
        options: &IngestOptions,
        stats: &mut IngestStats,
        started: Instant,
    ) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        if options.dry_run {
            debug!("Dry run: not upserting {} points", batch.len());
            return Ok(());
        }

        match self.index.upsert(&self.collection, batch).await {
            Ok(written) => {
                debug!("Flushed {} points into '{}'", written, self.collection);
                stats.upserted += written;
                Ok(())
            }
            Err(e) => {
                stats.elapsed = started.elapsed();
                Err(RagError::IngestInterrupted {
                    stats: Box::new(stats.clone()),
                    source: Box::new(e),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::test_support::HashEmbedder;
    use crate::vector_index::{
        CollectionInfo, Distance, MemoryIndex, RetrievedHit, SearchFilter,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const DIM: usize = 64;

    /// Delegates to a [`MemoryIndex`], counting upserts and optionally
    /// failing from the n-th one on.
    struct CountingIndex {
        inner: MemoryIndex,
        upserts: AtomicUsize,
        batch_sizes: Mutex<Vec<usize>>,
        fail_from: Option<usize>,
    }

    impl CountingIndex {
        fn new(fail_from: Option<usize>) -> Self {
            Self {
                inner: MemoryIndex::new(),
                upserts: AtomicUsize::new(0),
                batch_sizes: Mutex::new(Vec::new()),
                fail_from,
            }
        }
    }

    #[async_trait]
    impl VectorIndex for CountingIndex {
        async fn create_collection(&self, name: &str, dimension: usize, distance: Distance) -> Result<()> {
            self.inner.create_collection(name, dimension, distance).await
        }
        async fn collection_exists(&self, name: &str) -> Result<bool> {
            self.inner.collection_exists(name).await
        }
        async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
            self.inner.collection_info(name).await
        }
        async fn upsert(&self, name: &str, points: &[IndexedPoint]) -> Result<usize> {
            let n = self.upserts.fetch_add(1, Ordering::SeqCst) + 1;
            self.batch_sizes.lock().unwrap().push(points.len());
            if self.fail_from.is_some_and(|from| n >= from) {
                return Err(RagError::IndexUnavailable("connection refused".into()));
            }
            self.inner.upsert(name, points).await
        }
        async fn search(
            &self,
            name: &str,
            vector: &[f32],
            limit: usize,
            filter: &SearchFilter,
        ) -> Result<Vec<RetrievedHit>> {
            self.inner.search(name, vector, limit, filter).await
        }
        async fn count(&self, name: &str) -> Result<usize> {
            self.inner.count(name).await
        }
        async fn drop_collection(&self, name: &str) -> Result<()> {
            self.inner.drop_collection(name).await
        }
    }

    /// `len` characters with no periods or whitespace, so windows are never snapped or trimmed.
    fn digits(len: usize) -> String {
        (0u32..)
            .flat_map(|i| i.to_string().chars().collect::<Vec<_>>())
            .take(len)
            .collect()
    }

    async fn setup(
        fail_from: Option<usize>,
        embedder: HashEmbedder,
    ) -> (Arc<CountingIndex>, Arc<HashEmbedder>, Ingestor) {
        let index = Arc::new(CountingIndex::new(fail_from));
        index.create_collection("videos", DIM, Distance::Cosine).await.unwrap();
        let embedder = Arc::new(embedder);
        let ingestor = Ingestor::new(
            index.clone(),
            embedder.clone(),
            TextChunker::new(500, 100).unwrap(),
            ImportanceScorer::new(["tutorial", "recipe"]),
            "videos",
        );
        (index, embedder, ingestor)
    }

    fn options(batch_size_embed: usize, batch_size_upsert: usize) -> IngestOptions {
        IngestOptions {
            batch_size_embed,
            batch_size_upsert,
            workers: 2,
            dry_run: false,
        }
    }

    #[test]
    fn test_youtube_document_defaults() {
        let doc = SourceDocument::youtube("abc123", None, "hello");
        assert_eq!(doc.doc_id, "yt_abc123");
        assert_eq!(doc.source, "youtube");
        assert_eq!(doc.source_url, "https://youtu.be/abc123");
        assert_eq!(doc.title, "Video abc123");
        assert!(doc.tags.contains("youtube") && doc.tags.contains("transcript"));
        assert_eq!(doc.metadata.channel_title.as_deref(), Some(UNKNOWN_CHANNEL));
        assert_eq!(
            doc.metadata.description.as_deref(),
            Some("Transcript for yt_abc123 (Video abc123)")
        );

        let doc = doc
            .with_tags(["recipe"])
            .with_metadata(DocumentMetadata {
                channel_title: Some("Dev&Food".into()),
                view_count: Some(10),
                ..Default::default()
            });
        assert_eq!(doc.tags.len(), 1);
        assert_eq!(doc.metadata.channel_title.as_deref(), Some("Dev&Food"));
        assert_eq!(doc.metadata.view_count, Some(10));
        assert!(doc.metadata.description.is_some());
    }

    #[tokio::test]
    async fn test_end_to_end_three_chunks() {
        let (index, _, ingestor) = setup(None, HashEmbedder::new(DIM)).await;
        let doc = SourceDocument::youtube("abc", Some("Numbers"), digits(1050));

        let stats = ingestor.ingest(&[doc], &options(256, 512)).await.unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.upserted, 3);

        let mut hits = index
            .search("videos", &vec![1.0; DIM], 10, &SearchFilter::new())
            .await
            .unwrap();
        hits.sort_by_key(|h| h.payload.chunk_index);
        let starts: Vec<usize> = hits.iter().map(|h| h.payload.start_char).collect();
        assert_eq!(starts, vec![0, 400, 800]);
        assert!(hits.iter().all(|h| h.payload.total_chunks == 3));
        assert_eq!(hits[2].payload.end_char, 1050);
        assert_eq!(hits[1].payload.external_id, "yt_abc_1");
        assert_eq!(hits[1].id, point_id("yt_abc", 1));

        // Querying with the first chunk's own text finds it first.
        let query = HashEmbedder::new(DIM).vector(&hits[0].payload.text);
        let top = index.search("videos", &query, 1, &SearchFilter::new()).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].payload.chunk_index, 0);
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let (index, _, ingestor) = setup(None, HashEmbedder::new(DIM)).await;
        let docs = vec![
            SourceDocument::youtube("a", None, digits(1050)),
            SourceDocument::youtube("b", None, "A short tutorial. Nothing else."),
        ];

        let first = ingestor.ingest(&docs, &options(2, 2)).await.unwrap();
        let ids_before: BTreeSet<_> = index
            .search("videos", &vec![1.0; DIM], 100, &SearchFilter::new())
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.id)
            .collect();

        let second = ingestor.ingest(&docs, &options(2, 2)).await.unwrap();
        let ids_after: BTreeSet<_> = index
            .search("videos", &vec![1.0; DIM], 100, &SearchFilter::new())
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.id)
            .collect();

        assert_eq!(first.upserted, 4);
        assert_eq!(second.upserted, 4);
        assert_eq!(ids_before, ids_after);
        assert_eq!(index.count("videos").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_final_partial_batch_is_flushed() {
        let (index, _, ingestor) = setup(None, HashEmbedder::new(DIM)).await;
        let docs = vec![SourceDocument::youtube("abc", None, digits(1050))];

        // Three chunks with room for two per upsert: one full flush, one tail flush.
        let stats = ingestor.ingest(&docs, &options(1, 2)).await.unwrap();
        assert_eq!(stats.upserted, stats.chunks);
        assert_eq!(index.upserts.load(Ordering::SeqCst), 2);
        assert_eq!(index.count("videos").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_upserts_never_exceed_batch_size() {
        let (index, _, ingestor) = setup(None, HashEmbedder::new(DIM)).await;
        // Five chunks per document, ten points in total.
        let docs = vec![
            SourceDocument::youtube("long1", None, digits(2000)),
            SourceDocument::youtube("long2", None, digits(2000)),
        ];

        let stats = ingestor.ingest(&docs, &options(256, 4)).await.unwrap();
        assert_eq!(stats.chunks, 10);
        assert_eq!(stats.upserted, 10);
        assert_eq!(*index.batch_sizes.lock().unwrap(), vec![4, 4, 2]);
        assert_eq!(index.count("videos").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_importance_and_payload_fields() {
        let (index, _, ingestor) = setup(None, HashEmbedder::new(DIM)).await;
        let doc = SourceDocument::youtube("r1", Some("Carbonara"), "A quick Recipe tutorial.\nEnjoy.");
        ingestor.ingest(&[doc], &IngestOptions::default()).await.unwrap();

        let hits = index
            .search("videos", &vec![1.0; DIM], 10, &SearchFilter::new().with_min_importance(2.0))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        let payload = &hits[0].payload;
        assert_eq!(payload.importance, 2.0);
        assert_eq!(payload.text, "A quick Recipe tutorial. Enjoy.");
        assert_eq!(payload.title, "Carbonara");
        assert_eq!(payload.total_chunks, 1);
        assert_eq!(payload.source_url, "https://youtu.be/r1");
    }

    #[tokio::test]
    async fn test_embedding_failure_skips_document() {
        let (index, _, ingestor) = setup(None, HashEmbedder::failing_on(DIM, "POISON")).await;
        let docs = vec![
            SourceDocument::youtube("good", None, "This one embeds fine."),
            SourceDocument::youtube("bad", None, "This one contains POISON."),
            SourceDocument::youtube("also_good", None, "And so does this one."),
        ];

        let stats = ingestor.ingest(&docs, &options(8, 8)).await.unwrap();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.upserted, 2);
        assert_eq!(stats.failed.len(), 1);
        assert_eq!(stats.failed[0].doc_id, "yt_bad");

        let bad = index
            .search("videos", &vec![1.0; DIM], 10, &SearchFilter::new().with_doc_id("yt_bad"))
            .await
            .unwrap();
        assert!(bad.is_empty());
    }

    #[tokio::test]
    async fn test_empty_document_is_skipped() {
        let (index, embedder, ingestor) = setup(None, HashEmbedder::new(DIM)).await;
        let docs = vec![SourceDocument::youtube("empty", None, " \r\n ")];

        let stats = ingestor.ingest(&docs, &IngestOptions::default()).await.unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.documents, 0);
        assert!(stats.failed.is_empty());
        assert_eq!(embedder.calls(), 0);
        assert_eq!(index.upserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let (index, embedder, ingestor) = setup(None, HashEmbedder::new(DIM)).await;
        let docs = vec![SourceDocument::youtube("abc", None, digits(1050))];

        let stats = ingestor
            .ingest(&docs, &IngestOptions { dry_run: true, ..options(1, 1) })
            .await
            .unwrap();
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.upserted, 0);
        assert_eq!(embedder.calls(), 3);
        assert_eq!(index.upserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upsert_failure_reports_committed_stats() {
        let (index, _, ingestor) = setup(Some(2), HashEmbedder::new(DIM)).await;
        let docs = vec![
            SourceDocument::youtube("first", None, "Committed before the failure."),
            SourceDocument::youtube("second", None, "Lost to the failing flush."),
        ];

        let err = ingestor.ingest(&docs, &options(1, 1)).await.unwrap_err();
        match err {
            RagError::IngestInterrupted { stats, source } => {
                assert_eq!(stats.upserted, 1);
                assert!(matches!(*source, RagError::IndexUnavailable(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(index.count("videos").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rejects_zero_batch_size() {
        let (_, _, ingestor) = setup(None, HashEmbedder::new(DIM)).await;
        let err = ingestor.ingest(&[], &options(0, 1)).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
    }
}
