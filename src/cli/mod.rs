//! CLI module for ragtube.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ragtube - Question answering over video transcripts
///
/// Ingest transcripts into a vector index, search them, and ask questions
/// answered only from what the videos actually say.
#[derive(Parser, Debug)]
#[command(name = "ragtube")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Collection to use instead of the configured one
    #[arg(long, global = true)]
    pub collection: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest every <video_id>.txt transcript in a directory
    Ingest {
        /// Directory of transcripts (optional <video_id>.json sidecars)
        dir: PathBuf,

        /// Extra tag for every ingested chunk (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,

        /// Drop and recreate the collection first
        #[arg(long)]
        recreate: bool,

        /// Chunk and embed without writing to the index
        #[arg(long)]
        dry_run: bool,

        /// Concurrent embedding requests
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Search indexed transcripts
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only return chunks carrying this tag (repeatable, all must match)
        #[arg(short, long)]
        tag: Vec<String>,

        /// Minimum importance score
        #[arg(long)]
        min_importance: Option<f32>,

        /// Only search within this document (e.g. yt_dQw4w9WgXcQ)
        #[arg(long)]
        doc_id: Option<String>,

        /// Print hits as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask a question answered from the indexed transcripts
    Ask {
        /// The question to ask
        question: String,

        /// Number of chunks to retrieve as context
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// LLM model to use for answer generation
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Manage the vector collection
    Collection {
        #[command(subcommand)]
        action: CollectionAction,
    },

    /// Start the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CollectionAction {
    /// Create the collection if it does not exist
    Create,

    /// Drop and recreate the collection (deletes all points)
    Recreate {
        /// Confirm the destructive operation
        #[arg(long)]
        yes: bool,
    },

    /// Drop the collection (deletes all points)
    Drop {
        /// Confirm the destructive operation
        #[arg(long)]
        yes: bool,
    },

    /// Show dimension, distance and point count
    Info,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
