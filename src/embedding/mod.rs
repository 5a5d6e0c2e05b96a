//! Embedding generation for ingestion and retrieval.

mod openai;

pub use openai::OpenAIEmbedder;

use crate::error::{RagError, Result};
use async_trait::async_trait;

/// Trait for embedding generation.
///
/// Implementations return exactly one vector per input, in input order,
/// each of length [`Embedder::dimensions`].
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("Empty embedding response".to_string()))
    }

    /// Generate embeddings for multiple texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

/// Check that a backend returned one vector of the right size per input.
pub(crate) fn validate_batch(vectors: &[Vec<f32>], inputs: usize, dimensions: usize) -> Result<()> {
    if vectors.len() != inputs {
        return Err(RagError::Embedding(format!(
            "Malformed embedding response: expected {} vectors, got {}",
            inputs,
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
        return Err(RagError::Embedding(format!(
            "Malformed embedding response: expected {} dimensions, got {}",
            dimensions,
            bad.len()
        )));
    }
    Ok(())
}

/// Deterministic embedders for tests.
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hashes character trigrams into a small normalized vector, so similar
    /// texts land close together and identical texts embed identically.
    pub struct HashEmbedder {
        pub dimensions: usize,
        pub calls: AtomicUsize,
        /// Fail any batch containing a text with this marker.
        pub fail_on: Option<String>,
    }

    impl HashEmbedder {
        pub fn new(dimensions: usize) -> Self {
            Self {
                dimensions,
                calls: AtomicUsize::new(0),
                fail_on: None,
            }
        }

        pub fn failing_on(dimensions: usize, marker: &str) -> Self {
            Self {
                fail_on: Some(marker.to_string()),
                ..Self::new(dimensions)
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn vector(&self, text: &str) -> Vec<f32> {
            let mut v = vec![0.0f32; self.dimensions];
            let chars: Vec<char> = text.to_lowercase().chars().collect();
            for window in chars.windows(3) {
                let h = window
                    .iter()
                    .fold(7usize, |acc, c| acc.wrapping_mul(31).wrapping_add(*c as usize));
                v[h % self.dimensions] += 1.0;
            }
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                v.iter_mut().for_each(|x| *x /= norm);
            } else {
                v[0] = 1.0;
            }
            v
        }
    }

    #[async_trait]
    impl Embedder for HashEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(marker) = &self.fail_on {
                if texts.iter().any(|t| t.contains(marker.as_str())) {
                    return Err(RagError::Embedding("service unavailable".to_string()));
                }
            }
            Ok(texts.iter().map(|t| self.vector(t)).collect())
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }
    }
}
