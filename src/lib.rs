//! ragtube - Retrieval-augmented question answering over video transcripts
//!
//! Ingests transcripts into a vector index and answers questions grounded
//! only in the retrieved passages.
//!
//! # Overview
//!
//! ragtube allows you to:
//! - Chunk transcripts into overlapping, sentence-aware windows
//! - Embed and upsert them idempotently into Qdrant, SQLite or memory
//! - Search with tag, importance and document filters
//! - Ask questions answered only from the retrieved context
//!
//! # Architecture
//!
//! - `config` - Typed settings and prompt templates
//! - `chunking` - Sentence-aware sliding window chunker
//! - `scoring` - Keyword importance scoring
//! - `identity` - Deterministic point ids
//! - `embedding` - Embedding generation
//! - `generation` - Text generation and prompt token budgeting
//! - `vector_index` - Vector index backends and collection management
//! - `ingest` - Batched ingestion
//! - `search` - Filtered semantic search
//! - `answer` - Grounded answer generation
//! - `transcripts` - Transcript sources
//! - `pipeline` - Composition of all of the above
//!
//! # Example
//!
//! ```rust,no_run
//! use ragtube::config::Settings;
//! use ragtube::ingest::{IngestOptions, SourceDocument};
//! use ragtube::pipeline::RagPipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = RagPipeline::from_settings(settings)?;
//!
//!     let doc = SourceDocument::youtube("dQw4w9WgXcQ", None, "Transcript text...");
//!     let stats = pipeline.ingest(&[doc], &IngestOptions::default()).await?;
//!     println!("Indexed {} chunks", stats.upserted);
//!
//!     let response = pipeline.query("What is the video about?", 5).await?;
//!     println!("{}", response.answer);
//!     Ok(())
//! }
//! ```

pub mod answer;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod identity;
pub mod ingest;
pub mod openai;
pub mod pipeline;
pub mod retry;
pub mod scoring;
pub mod search;
pub mod transcripts;
pub mod vector_index;

pub use error::{RagError, Result};
