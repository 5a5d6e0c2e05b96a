//! OpenAI embeddings implementation.

use super::{validate_batch, Embedder};
use crate::error::{RagError, Result};
use crate::openai::create_client;
use crate::retry::RetryPolicy;
use async_openai::config::OpenAIConfig;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Maximum number of inputs the embeddings endpoint accepts per request.
const MAX_INPUTS_PER_REQUEST: usize = 2048;

/// OpenAI-based embedder.
pub struct OpenAIEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    dimensions: usize,
    retry: RetryPolicy,
}

impl OpenAIEmbedder {
    /// Create an embedder for `model` producing `dimensions`-long vectors.
    pub fn new(model: &str, dimensions: usize, retry: RetryPolicy) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::Config("Embedding dimensions must be positive".into()));
        }
        Ok(Self {
            client: create_client()?,
            model: model.to_string(),
            dimensions,
            retry,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Only the text-embedding-3 family accepts a `dimensions` parameter.
    fn supports_dimensions(&self) -> bool {
        self.model.starts_with("text-embedding-3")
    }

    async fn request(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut args = CreateEmbeddingRequestArgs::default();
        args.model(&self.model).input(EmbeddingInput::StringArray(input));
        if self.supports_dimensions() {
            args.dimensions(self.dimensions as u32);
        }
        let request = args
            .build()
            .map_err(|e| RagError::Embedding(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| RagError::Embedding(format!("Embedding API error: {}", e)))?;

        // The API does not promise ordering; restore it by index.
        let mut data = response.data;
        data.sort_by_key(|e| e.index);
        Ok(data.into_iter().map(|e| e.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, texts), fields(count = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_INPUTS_PER_REQUEST) {
            let vectors = self
                .retry
                .run("embedding request", || self.request(chunk.to_vec()))
                .await?;
            validate_batch(&vectors, chunk.len(), self.dimensions)?;
            all_embeddings.extend(vectors);
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_creation() {
        let embedder = OpenAIEmbedder::new("text-embedding-3-small", 1536, RetryPolicy::none()).unwrap();
        assert_eq!(embedder.dimensions(), 1536);
        assert!(embedder.supports_dimensions());

        let embedder = OpenAIEmbedder::new("text-embedding-ada-002", 1536, RetryPolicy::none()).unwrap();
        assert_eq!(embedder.model(), "text-embedding-ada-002");
        assert!(!embedder.supports_dimensions());
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            OpenAIEmbedder::new("text-embedding-3-small", 0, RetryPolicy::none()),
            Err(RagError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let embedder = OpenAIEmbedder::new("text-embedding-3-small", 8, RetryPolicy::none()).unwrap();
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }
}
