//! Grounded answer generation from retrieved contexts.
//!
//! Contexts are joined in the order given, rendered into the answer
//! template, and the whole prompt is truncated to the generator's input
//! budget. Truncation keeps a prefix, so callers should order contexts by
//! descending relevance: later contexts are the first to be cut.

use crate::config::Prompts;
use crate::error::Result;
use crate::generation::{TextGenerator, TokenBudget};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Returned instead of calling the generator when there is nothing to ground on.
pub const NO_CONTEXT_ANSWER: &str = "No results in index.";

/// Placed between contexts in the assembled context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Builds bounded prompts and asks the generator for an answer.
pub struct Answerer {
    generator: Arc<dyn TextGenerator>,
    budget: TokenBudget,
    prompts: Prompts,
    max_output_tokens: u32,
}

impl Answerer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        budget: TokenBudget,
        prompts: Prompts,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            generator,
            budget,
            prompts,
            max_output_tokens,
        }
    }

    /// Join the non-blank contexts with [`CONTEXT_SEPARATOR`].
    pub fn context_block<S: AsRef<str>>(contexts: &[S]) -> String {
        contexts
            .iter()
            .map(|c| c.as_ref().trim())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    }

    /// Render the answer template and truncate it to the input budget.
    pub fn build_prompt(&self, question: &str, context: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.trim().to_string());
        vars.insert("context".to_string(), context.to_string());
        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.answer.template, &vars);

        let tokens = self.budget.count(&prompt);
        if tokens > self.budget.max_input_tokens() {
            warn!(
                "Prompt has {} tokens, truncating to {}",
                tokens,
                self.budget.max_input_tokens()
            );
            return self.budget.truncate(&prompt);
        }
        prompt
    }

    /// Answer `question` using only `contexts`.
    ///
    /// With no usable context this returns [`NO_CONTEXT_ANSWER`] and the
    /// generator is never called.
    #[instrument(skip(self, contexts), fields(count = contexts.len()))]
    pub async fn answer<S: AsRef<str> + Sync>(&self, question: &str, contexts: &[S]) -> Result<String> {
        let context = Self::context_block(contexts);
        if context.is_empty() {
            info!("No context for question, returning sentinel");
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }

        let prompt = self.build_prompt(question, &context);
        debug!("Prompt is {} characters", prompt.len());
        self.generator.generate(&prompt, self.max_output_tokens).await
    }
}
