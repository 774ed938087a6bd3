//! # LLM Collaborator
//!
//! Single request/response text completion used for step summaries, the final
//! report, the role team and the chat endpoint.

use async_trait::async_trait;
use radkit::agent::LlmFunction;
use radkit::macros::LLMOutput;
use radkit::models::providers::{
    AnthropicLlm, DeepSeekLlm, GeminiLlm, GrokLlm, OpenAILlm, OpenRouterLlm,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::bridge::stream_pipe;
use crate::models::{LlmProvider, ModelConfig};

/// Text completion capability
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn ask(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Plain-text answer from the provider
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct TextReply {
    /// The complete answer, markdown allowed
    pub text: String,
}

/// Run the text function against an already-built provider client
macro_rules! text_function {
    ($llm:expr, $input:expr) => {
        LlmFunction::<TextReply>::new_with_system_instructions($llm, SYSTEM_PROMPT)
            .run($input)
            .await
            .map_err(anyhow::Error::from)
    };
}

/// [`LlmClient`] backed by the configured radkit provider
#[derive(Debug, Clone)]
pub struct ProviderLlm {
    config: ModelConfig,
}

impl ProviderLlm {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }
}

#[async_trait]
impl LlmClient for ProviderLlm {
    async fn ask(&self, prompt: &str) -> anyhow::Result<String> {
        tracing::debug!(
            provider = self.config.provider.display_name(),
            model = %self.config.model,
            prompt_chars = prompt.len(),
            "asking LLM"
        );

        let input = prompt.to_string();
        let model = self.config.model.as_str();
        let reply = match self.config.provider {
            LlmProvider::Anthropic => text_function!(AnthropicLlm::from_env(model)?, input),
            LlmProvider::OpenAI => {
                let mut llm = OpenAILlm::from_env(model)?;
                if let Some(base_url) = &self.config.base_url {
                    llm = llm.with_base_url(base_url);
                }
                text_function!(llm, input)
            }
            LlmProvider::Gemini => text_function!(GeminiLlm::from_env(model)?, input),
            LlmProvider::OpenRouter => text_function!(OpenRouterLlm::from_env(model)?, input),
            LlmProvider::Grok => text_function!(GrokLlm::from_env(model)?, input),
            LlmProvider::DeepSeek => text_function!(DeepSeekLlm::from_env(model)?, input),
        }?;

        // Surface the answer on the current run's reasoning channel.
        stream_pipe::log_llm_stream(&reply.text);
        Ok(reply.text)
    }
}

const SYSTEM_PROMPT: &str = include_str!("defaults/assistant.md");


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LlmProvider;

    #[test]
    fn test_provider_llm_keeps_config() {
        let llm = ProviderLlm::new(ModelConfig::for_provider(LlmProvider::DeepSeek));
        assert_eq!(llm.config().model, "deepseek-chat");
    }

    #[test]
    fn test_text_reply_parses() {
        let reply: TextReply = serde_json::from_str(r#"{"text":"done"}"#).unwrap();
        assert_eq!(reply.text, "done");
    }
}
