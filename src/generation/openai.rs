//! OpenAI chat-completion generator.

use super::TextGenerator;
use crate::error::{RagError, Result};
use crate::openai::create_client;
use crate::retry::RetryPolicy;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Generator backed by the OpenAI chat completions API.
pub struct OpenAIGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    system_prompt: String,
    temperature: f32,
    retry: RetryPolicy,
}

impl OpenAIGenerator {
    pub fn new(model: &str, system_prompt: &str, temperature: f32, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: model.to_string(),
            system_prompt: system_prompt.to_string(),
            temperature,
            retry,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn messages(&self, prompt: &str) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages = Vec::with_capacity(2);
        if !self.system_prompt.trim().is_empty() {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(self.system_prompt.clone())
                    .build()
                    .map_err(|e| RagError::Generation(e.to_string()))?
                    .into(),
            );
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()
                .map_err(|e| RagError::Generation(e.to_string()))?
                .into(),
        );
        Ok(messages)
    }

    async fn complete(&self, prompt: &str, max_output_tokens: u32) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(self.messages(prompt)?)
            .temperature(self.temperature)
            .max_completion_tokens(max_output_tokens)
            .build()
            .map_err(|e| RagError::Generation(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| RagError::Generation(format!("Failed to generate response: {}", e)))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| RagError::Generation("Empty response from LLM".to_string()))
    }
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String> {
        let answer = self
            .retry
            .run("chat completion", || self.complete(prompt, max_output_tokens))
            .await?;
        debug!("Generated {} characters", answer.len());
        Ok(answer)
    }
}
