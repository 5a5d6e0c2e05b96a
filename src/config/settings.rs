//! Configuration settings for ragtube.

use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub ingestion: IngestionSettings,
    pub llm: LlmSettings,
    pub retry: RetrySettings,
    pub search: SearchSettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.ragtube".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai).
    pub provider: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions. Fixed for the lifetime of a collection.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Vector index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Index backend (qdrant, sqlite, memory).
    pub provider: String,
    /// Collection holding the transcript chunks.
    pub collection: String,
    /// Distance metric used when the collection is created (cosine, dot, euclid).
    pub distance: String,
    /// Qdrant gRPC endpoint.
    pub qdrant_url: String,
    /// Qdrant API key (Qdrant Cloud or secured instances).
    pub qdrant_api_key: Option<String>,
    /// Path to the SQLite database (for the sqlite provider).
    pub sqlite_path: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            provider: "qdrant".to_string(),
            collection: "youtube_rag".to_string(),
            distance: "cosine".to_string(),
            qdrant_url: "http://localhost:6334".to_string(),
            qdrant_api_key: None,
            sqlite_path: "~/.ragtube/index.db".to_string(),
        }
    }
}

/// Chunking, scoring and batching knobs for ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionSettings {
    /// Chunk window size in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Keywords that raise a chunk's importance by 0.5 each.
    pub importance_keywords: Vec<String>,
    /// Tags attached to every ingested chunk.
    pub default_tags: Vec<String>,
    /// Chunks per embedding call.
    pub batch_size_embed: usize,
    /// Points per upsert call.
    pub batch_size_upsert: usize,
    /// Embedding calls allowed in flight at once.
    pub workers: usize,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            importance_keywords: vec![
                "tutorial".to_string(),
                "recipe".to_string(),
                "steps".to_string(),
                "summary".to_string(),
                "conclusion".to_string(),
            ],
            default_tags: vec!["youtube".to_string(), "transcript".to_string()],
            batch_size_embed: 256,
            batch_size_upsert: 512,
            workers: 4,
        }
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Chat model used to synthesize answers.
    pub model: String,
    /// Token budget of the assembled prompt.
    pub max_input_tokens: usize,
    /// Maximum tokens the model may generate.
    pub max_output_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_input_tokens: 4096,
            max_output_tokens: 256,
            temperature: 0.0,
        }
    }
}

/// Bounded retry around embedding and generation calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay_ms: u64,
    /// Upper bound of the exponential delay.
    pub max_delay_ms: u64,
    /// Random extra delay added to each retry.
    pub jitter_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter_ms: 250,
        }
    }
}

/// Retrieval defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Hits retrieved per question.
    pub top_k: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    ///
    /// The loaded settings are validated before they are returned.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Settings>(&content)?
        } else {
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let ingestion = &self.ingestion;
        if ingestion.chunk_size == 0 {
            return Err(RagError::Config("ingestion.chunk_size must be greater than 0".into()));
        }
        if ingestion.chunk_overlap >= ingestion.chunk_size {
            return Err(RagError::Config(format!(
                "ingestion.chunk_overlap ({}) must be smaller than ingestion.chunk_size ({})",
                ingestion.chunk_overlap, ingestion.chunk_size
            )));
        }
        if ingestion.batch_size_embed == 0 || ingestion.batch_size_upsert == 0 {
            return Err(RagError::Config("ingestion batch sizes must be at least 1".into()));
        }
        if ingestion.workers == 0 {
            return Err(RagError::Config("ingestion.workers must be at least 1".into()));
        }
        if self.embedding.dimensions == 0 {
            return Err(RagError::Config("embedding.dimensions must be greater than 0".into()));
        }
        if self.embedding.provider != "openai" {
            return Err(RagError::Config(format!(
                "Unknown embedding provider: {}",
                self.embedding.provider
            )));
        }
        if !matches!(self.index.provider.as_str(), "qdrant" | "sqlite" | "memory") {
            return Err(RagError::Config(format!(
                "Unknown index provider: {}",
                self.index.provider
            )));
        }
        if self.index.collection.trim().is_empty() {
            return Err(RagError::Config("index.collection must not be empty".into()));
        }
        self.index
            .distance
            .parse::<crate::vector_index::Distance>()
            .map_err(RagError::Config)?;
        if self.retry.max_attempts == 0 {
            return Err(RagError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.llm.max_input_tokens == 0 {
            return Err(RagError::Config("llm.max_input_tokens must be greater than 0".into()));
        }
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| RagError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ragtube")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.index.sqlite_path)
    }

    /// Distance metric parsed from `index.distance`.
    pub fn distance(&self) -> Result<crate::vector_index::Distance> {
        self.index.distance.parse().map_err(RagError::Config)
    }
}

impl RetrySettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }
}
