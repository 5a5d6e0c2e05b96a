//! Transcript sources.
//!
//! A [`TranscriptProvider`] maps a video id to its raw transcript text.
//! [`FolderTranscripts`] reads `<dir>/<video_id>.txt` files, each with an
//! optional `<video_id>.json` sidecar describing the video.

use crate::error::{RagError, Result};
use crate::vector_index::DocumentMetadata;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Source of raw transcripts.
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    /// Transcript text for `video_id`, or `None` if it is unavailable.
    async fn transcript(&self, video_id: &str) -> Result<Option<String>>;
}

/// Optional per-video metadata stored next to a transcript.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TranscriptSidecar {
    pub title: Option<String>,
    pub source_url: Option<String>,
    pub tags: Vec<String>,
    pub metadata: Option<DocumentMetadata>,
}

/// Transcripts stored as text files in a directory.
pub struct FolderTranscripts {
    dir: PathBuf,
}

impl FolderTranscripts {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(RagError::TranscriptUnavailable(format!(
                "Transcript directory not found: {}",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Video ids of every `*.txt` file, sorted.
    pub fn list_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Sidecar metadata for `video_id`, if a readable one exists.
    ///
    /// A malformed sidecar is logged and ignored rather than failing the video.
    pub fn sidecar(&self, video_id: &str) -> Option<TranscriptSidecar> {
        let path = self.dir.join(format!("{}.json", video_id));
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(sidecar) => Some(sidecar),
            Err(e) => {
                warn!("Ignoring malformed sidecar {:?}: {}", path, e);
                None
            }
        }
    }
}

#[async_trait]
impl TranscriptProvider for FolderTranscripts {
    async fn transcript(&self, video_id: &str) -> Result<Option<String>> {
        let path = self.dir.join(format!("{}.txt", video_id));
        match tokio::fs::read_to_string(&path).await {
            Ok(text) if text.trim().is_empty() => {
                debug!("Transcript {:?} is empty", path);
                Ok(None)
            }
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RagError::TranscriptUnavailable(format!("{}: {}", path.display(), e))),
        }
    }
}
