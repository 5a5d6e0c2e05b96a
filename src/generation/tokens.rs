//! Prompt token budgeting with tiktoken.

use crate::error::{RagError, Result};
use tiktoken_rs::CoreBPE;
use tracing::debug;

/// Counts tokens and truncates prompts to a fixed input budget.
pub struct TokenBudget {
    encoder: CoreBPE,
    max_input_tokens: usize,
}

impl TokenBudget {
    /// Budget for `model`, using its BPE if known and `cl100k_base` otherwise.
    pub fn for_model(model: &str, max_input_tokens: usize) -> Result<Self> {
        let encoder = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(_) => {
                debug!("No tokenizer registered for '{}', using cl100k_base", model);
                tiktoken_rs::cl100k_base()
                    .map_err(|e| RagError::Config(format!("Failed to load tokenizer: {}", e)))?
            }
        };
        Ok(Self {
            encoder,
            max_input_tokens,
        })
    }

    pub fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }

    pub fn count(&self, text: &str) -> usize {
        self.encoder.encode_with_special_tokens(text).len()
    }

    /// Keep the longest prefix of `text` that fits in the budget.
    pub fn truncate(&self, text: &str) -> String {
        let tokens = self.encoder.encode_with_special_tokens(text);
        if tokens.len() <= self.max_input_tokens {
            return text.to_string();
        }

        // A cut inside a multi-byte character does not decode; back off a token at a time.
        let mut keep = self.max_input_tokens;
        while keep > 0 {
            if let Ok(prefix) = self.encoder.decode(tokens[..keep].to_vec()) {
                debug!("Truncated prompt from {} to {} tokens", tokens.len(), keep);
                return prefix;
            }
            keep -= 1;
        }
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_untouched() {
        let budget = TokenBudget::for_model("gpt-4o-mini", 100).unwrap();
        let text = "How long should the pasta boil?";
        assert_eq!(budget.truncate(text), text);
        assert!(budget.count(text) > 0);
    }

    #[test]
    fn test_truncate_keeps_prefix_within_budget() {
        let budget = TokenBudget::for_model("unknown-model", 10).unwrap();
        let text = "word ".repeat(200);
        let truncated = budget.truncate(&text);
        assert!(budget.count(&truncated) <= 10);
        assert!(!truncated.is_empty());
        assert!(text.starts_with(&truncated));
    }

    #[test]
    fn test_zero_budget() {
        let budget = TokenBudget::for_model("gpt-4o-mini", 0).unwrap();
        assert_eq!(budget.truncate("anything at all"), "");
        assert_eq!(budget.max_input_tokens(), 0);
    }
}
