//! Pipeline composition for ragtube.
//!
//! [`RagPipeline`] owns one index client, one embedder and one generator and
//! wires them into the ingestor, searcher and answerer. Nothing here is
//! global: build as many pipelines as needed, from settings or from
//! explicit components.

use crate::answer::Answerer;
use crate::chunking::TextChunker;
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{RagError, Result};
use crate::generation::{OpenAIGenerator, TextGenerator, TokenBudget};
use crate::ingest::{IngestOptions, IngestStats, Ingestor, SourceDocument};
use crate::retry::RetryPolicy;
use crate::scoring::ImportanceScorer;
use crate::search::{SearchOverrides, Searcher};
use crate::transcripts::{FolderTranscripts, TranscriptProvider};
use crate::vector_index::{
    CollectionInfo, CollectionStatus, IndexManager, MemoryIndex, QdrantIndex, RetrievedHit,
    SearchFilter, SqliteIndex, VectorIndex,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Answer to a question together with the hits it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub hits: Vec<RetrievedHit>,
}

/// The composed ingestion and question-answering pipeline.
pub struct RagPipeline {
    settings: Settings,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    manager: IndexManager,
    ingestor: Ingestor,
    searcher: Searcher,
    answerer: Answerer,
}

impl RagPipeline {
    /// Build every component from `settings`.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        settings.validate()?;

        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let retry = RetryPolicy::from(&settings.retry);

        let index = Self::index_from_settings(&settings)?;
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::new(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
            retry.clone(),
        )?);
        let generator: Arc<dyn TextGenerator> = Arc::new(OpenAIGenerator::new(
            &settings.llm.model,
            &prompts.answer.system,
            settings.llm.temperature,
            retry,
        )?);

        Self::with_components(settings, index, embedder, generator, prompts)
    }

    /// Assemble a pipeline from explicit components.
    pub fn with_components(
        settings: Settings,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn TextGenerator>,
        prompts: Prompts,
    ) -> Result<Self> {
        settings.validate()?;
        if embedder.dimensions() != settings.embedding.dimensions as usize {
            return Err(RagError::Config(format!(
                "Embedder produces {} dimensions but embedding.dimensions is {}",
                embedder.dimensions(),
                settings.embedding.dimensions
            )));
        }

        let collection = settings.index.collection.clone();
        let chunker = TextChunker::new(settings.ingestion.chunk_size, settings.ingestion.chunk_overlap)?;
        let scorer = ImportanceScorer::new(&settings.ingestion.importance_keywords);
        let budget = TokenBudget::for_model(&settings.llm.model, settings.llm.max_input_tokens)?;

        Ok(Self {
            manager: IndexManager::new(index.clone()),
            ingestor: Ingestor::new(index.clone(), embedder.clone(), chunker, scorer, collection.clone()),
            searcher: Searcher::new(index.clone(), embedder.clone(), collection),
            answerer: Answerer::new(generator, budget, prompts, settings.llm.max_output_tokens),
            settings,
            index,
            embedder,
        })
    }

    fn index_from_settings(settings: &Settings) -> Result<Arc<dyn VectorIndex>> {
        let index: Arc<dyn VectorIndex> = match settings.index.provider.as_str() {
            "qdrant" => Arc::new(QdrantIndex::new(
                &settings.index.qdrant_url,
                settings.index.qdrant_api_key.clone(),
            )?),
            "sqlite" => Arc::new(SqliteIndex::new(&settings.sqlite_path())?),
            "memory" => {
                warn!("Using the in-memory index: nothing will outlive this process");
                Arc::new(MemoryIndex::new())
            }
            other => return Err(RagError::Config(format!("Unknown index provider: {}", other))),
        };
        Ok(index)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn collection(&self) -> &str {
        &self.settings.index.collection
    }

    pub fn index(&self) -> Arc<dyn VectorIndex> {
        self.index.clone()
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    pub fn manager(&self) -> &IndexManager {
        &self.manager
    }

    /// Create the configured collection if needed, checking an existing one
    /// against the embedder's dimensionality and the configured distance.
    pub async fn ensure_collection(&self) -> Result<CollectionStatus> {
        self.manager
            .create_if_missing(self.collection(), self.embedder.dimensions(), self.settings.distance()?)
            .await
    }

    /// Drop and recreate the configured collection. Destroys its points.
    pub async fn recreate_collection(&self) -> Result<()> {
        self.manager
            .recreate(self.collection(), self.embedder.dimensions(), self.settings.distance()?)
            .await
    }

    pub async fn collection_info(&self) -> Result<CollectionInfo> {
        self.manager.info(self.collection()).await
    }

    /// Ingest documents, creating the collection first unless this is a dry run.
    pub async fn ingest(&self, documents: &[SourceDocument], options: &IngestOptions) -> Result<IngestStats> {
        if !options.dry_run {
            self.ensure_collection().await?;
        }
        self.ingestor.ingest(documents, options).await
    }

    /// Ingest every `*.txt` transcript in `dir` as a YouTube document.
    ///
    /// Tags are the configured defaults, plus sidecar tags, plus `extra_tags`.
    /// Unavailable transcripts count as skipped.
    #[instrument(skip(self, extra_tags, options))]
    pub async fn ingest_folder(&self, dir: &Path, extra_tags: &[String], options: &IngestOptions) -> Result<IngestStats> {
        let folder = FolderTranscripts::new(dir)?;
        let ids = folder.list_ids()?;
        info!("Found {} transcripts in {:?}", ids.len(), dir);

        let mut documents = Vec::with_capacity(ids.len());
        let mut unavailable = 0;
        for id in &ids {
            let Some(text) = folder.transcript(id).await? else {
                warn!("Transcript for '{}' is unavailable, skipping", id);
                unavailable += 1;
                continue;
            };
            documents.push(self.folder_document(&folder, id, text, extra_tags));
        }

        let mut stats = self.ingest(&documents, options).await?;
        stats.skipped += unavailable;
        Ok(stats)
    }

    fn folder_document(&self, folder: &FolderTranscripts, id: &str, text: String, extra_tags: &[String]) -> SourceDocument {
        let sidecar = folder.sidecar(id).unwrap_or_default();

        let tags: Vec<String> = self
            .settings
            .ingestion
            .default_tags
            .iter()
            .chain(&sidecar.tags)
            .chain(extra_tags)
            .cloned()
            .collect();

        let mut doc = SourceDocument::youtube(id, sidecar.title.as_deref(), text).with_tags(tags);
        if let Some(url) = sidecar.source_url {
            doc.source_url = url;
        }
        if let Some(metadata) = sidecar.metadata {
            doc = doc.with_metadata(metadata);
        }
        doc
    }

    /// Top `top_k` hits for `question`.
    pub async fn retrieve(&self, question: &str, top_k: usize, filter: &SearchFilter) -> Result<Vec<RetrievedHit>> {
        self.searcher.search(question, top_k, filter).await
    }

    /// Retrieve with per-call overrides of collection or embedder.
    pub async fn retrieve_with(
        &self,
        question: &str,
        top_k: usize,
        filter: &SearchFilter,
        overrides: &SearchOverrides,
    ) -> Result<Vec<RetrievedHit>> {
        self.searcher.search_with(question, top_k, filter, overrides).await
    }

    /// Answer `question` from `hits`, in the order given.
    pub async fn answer(&self, question: &str, hits: &[RetrievedHit]) -> Result<String> {
        let contexts: Vec<&str> = hits.iter().map(|h| h.payload.text.as_str()).collect();
        self.answerer.answer(question, &contexts).await
    }

    /// Retrieve and answer in one call.
    pub async fn query(&self, question: &str, top_k: usize) -> Result<QueryResponse> {
        self.query_filtered(question, top_k, &SearchFilter::new()).await
    }

    #[instrument(skip(self, filter))]
    pub async fn query_filtered(&self, question: &str, top_k: usize, filter: &SearchFilter) -> Result<QueryResponse> {
        let hits = self.retrieve(question, top_k, filter).await?;
        let answer = self.answer(question, &hits).await?;
        Ok(QueryResponse { answer, hits })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::NO_CONTEXT_ANSWER;
    use crate::embedding::test_support::HashEmbedder;
    use crate::generation::test_support::CountingGenerator;

    const DIM: usize = 48;

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.index.provider = "memory".to_string();
        settings.index.collection = "test_videos".to_string();
        settings.embedding.dimensions = DIM as u32;
        settings
    }

    fn pipeline(generator: Arc<CountingGenerator>) -> RagPipeline {
        RagPipeline::with_components(
            settings(),
            Arc::new(MemoryIndex::new()),
            Arc::new(HashEmbedder::new(DIM)),
            generator,
            Prompts::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_ingest_then_query() {
        let generator = Arc::new(CountingGenerator::new("Nine minutes."));
        let pipeline = pipeline(generator.clone());

        let docs = vec![
            SourceDocument::youtube("pasta", Some("Carbonara"), "Boil the spaghetti for nine minutes. Then mix."),
            SourceDocument::youtube("rust", Some("Ownership"), "Every value in Rust has a single owner."),
        ];
        let stats = pipeline.ingest(&docs, &IngestOptions::default()).await.unwrap();
        assert_eq!(stats.upserted, 2);
        assert_eq!(pipeline.collection_info().await.unwrap().points, 2);

        let response = pipeline
            .query("Boil the spaghetti for nine minutes. Then mix.", 1)
            .await
            .unwrap();
        assert_eq!(response.answer, "Nine minutes.");
        assert_eq!(response.hits.len(), 1);
        assert_eq!(response.hits[0].payload.doc_id, "yt_pasta");
        assert!(generator
            .last_prompt()
            .unwrap()
            .contains("Boil the spaghetti for nine minutes."));
    }

    #[tokio::test]
    async fn test_empty_results_use_sentinel() {
        let generator = Arc::new(CountingGenerator::new("unused"));
        let pipeline = pipeline(generator.clone());
        pipeline.ensure_collection().await.unwrap();

        let response = pipeline.query("anything", 5).await.unwrap();
        assert_eq!(response.answer, NO_CONTEXT_ANSWER);
        assert!(response.hits.is_empty());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_collection_is_an_error_not_a_sentinel() {
        let pipeline = pipeline(Arc::new(CountingGenerator::new("unused")));
        let err = pipeline.query("anything", 5).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_ingest_folder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc.txt"), "A recipe tutorial.\nStep one: boil water.").unwrap();
        std::fs::write(
            dir.path().join("abc.json"),
            r#"{"title": "Carbonara", "tags": ["recipe"], "metadata": {"channel_title": "Dev&Food"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("blank.txt"), "\n\n").unwrap();

        let pipeline = pipeline(Arc::new(CountingGenerator::new("unused")));
        let stats = pipeline
            .ingest_folder(dir.path(), &["cooking".to_string()], &IngestOptions::default())
            .await
            .unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.upserted, 1);

        let hits = pipeline
            .retrieve("boil water", 5, &SearchFilter::new().with_tag("cooking").with_tag("recipe"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        let payload = &hits[0].payload;
        assert_eq!(payload.title, "Carbonara");
        assert_eq!(payload.metadata.channel_title.as_deref(), Some("Dev&Food"));
        assert!(payload.tags.contains("youtube"));
        assert!(payload.importance >= 2.0);
    }

    #[tokio::test]
    async fn test_existing_collection_with_other_dimension_is_rejected() {
        let index = Arc::new(MemoryIndex::new());
        index
            .create_collection("test_videos", DIM * 2, crate::vector_index::Distance::Cosine)
            .await
            .unwrap();
        let pipeline = RagPipeline::with_components(
            settings(),
            index,
            Arc::new(HashEmbedder::new(DIM)),
            Arc::new(CountingGenerator::new("unused")),
            Prompts::default(),
        )
        .unwrap();

        let err = pipeline
            .ingest(&[SourceDocument::youtube("a", None, "text")], &IngestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_embedder_must_match_settings() {
        let result = RagPipeline::with_components(
            settings(),
            Arc::new(MemoryIndex::new()),
            Arc::new(HashEmbedder::new(DIM + 1)),
            Arc::new(CountingGenerator::new("unused")),
            Prompts::default(),
        );
        assert!(matches!(result, Err(RagError::Config(_))));
    }
}
