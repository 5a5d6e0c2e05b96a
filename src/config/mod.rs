//! Configuration module for ragtube.
//!
//! Handles loading and validating application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AnswerPrompts, Prompts};
pub use settings::{
    EmbeddingSettings, GeneralSettings, IndexSettings, IngestionSettings, LlmSettings,
    PromptSettings, RetrySettings, SearchSettings, ServerSettings, Settings,
};
