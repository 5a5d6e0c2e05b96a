//! Text generation for answering questions.

mod openai;
mod tokens;

pub use openai::OpenAIGenerator;
pub use tokens::TokenBudget;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for text generation.
///
/// Callers pass a prompt already truncated to the generator's input budget.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion of at most `max_output_tokens` tokens.
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String>;
}
