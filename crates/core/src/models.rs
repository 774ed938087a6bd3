//! # Conductor Models
//!
//! LLM provider selection shared by the report recorder, the role team
//! and the chat endpoint.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported LLM providers
///
/// Each provider loads its API key from the environment:
/// - Anthropic (Claude) - `ANTHROPIC_API_KEY`
/// - OpenAI (GPT) - `OPENAI_API_KEY`
/// - Gemini (Google) - `GEMINI_API_KEY`
/// - OpenRouter (Gateway) - `OPENROUTER_API_KEY`
/// - Grok (xAI) - `XAI_API_KEY`
/// - DeepSeek - `DEEPSEEK_API_KEY`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
    Gemini,
    OpenRouter,
    Grok,
    DeepSeek,
}

impl LlmProvider {
    /// Get all available providers
    pub fn all() -> Vec<LlmProvider> {
        vec![
            LlmProvider::Anthropic,
            LlmProvider::OpenAI,
            LlmProvider::Gemini,
            LlmProvider::OpenRouter,
            LlmProvider::Grok,
            LlmProvider::DeepSeek,
        ]
    }

    /// Display name for logs and the CLI
    pub fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "Anthropic",
            LlmProvider::OpenAI => "OpenAI",
            LlmProvider::Gemini => "Gemini",
            LlmProvider::OpenRouter => "OpenRouter",
            LlmProvider::Grok => "Grok",
            LlmProvider::DeepSeek => "DeepSeek",
        }
    }

    /// Model used when the configuration names none
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
            LlmProvider::OpenAI => "gpt-4o",
            LlmProvider::Gemini => "gemini-2.0-flash-exp",
            LlmProvider::OpenRouter => "anthropic/claude-3.5-sonnet",
            LlmProvider::Grok => "grok-2",
            LlmProvider::DeepSeek => "deepseek-chat",
        }
    }

    /// Environment variable holding the API key
    pub fn env_var(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Gemini => "GEMINI_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
            LlmProvider::Grok => "XAI_API_KEY",
            LlmProvider::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }

    /// Whether this provider supports custom base URL
    pub fn supports_base_url(&self) -> bool {
        matches!(self, LlmProvider::OpenAI)
    }
}

impl FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(LlmProvider::Anthropic),
            "openai" => Ok(LlmProvider::OpenAI),
            "gemini" => Ok(LlmProvider::Gemini),
            "openrouter" => Ok(LlmProvider::OpenRouter),
            "grok" => Ok(LlmProvider::Grok),
            "deepseek" => Ok(LlmProvider::DeepSeek),
            other => {
                let known: Vec<String> = LlmProvider::all()
                    .iter()
                    .map(|provider| provider.display_name().to_ascii_lowercase())
                    .collect();
                anyhow::bail!("unknown LLM provider: {} (expected one of {})", other, known.join(", "))
            }
        }
    }
}

/// Configuration for LLM model selection
///
/// ## Example
/// ```rust,ignore
/// use conductor_core::models::{ModelConfig, LlmProvider};
///
/// let config = ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// LLM provider to use
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model name (e.g., "claude-sonnet-4-20250514", "gpt-4o")
    pub model: String,
    /// Optional base URL override for OpenAI-compatible APIs
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::for_provider(LlmProvider::Anthropic)
    }
}

impl ModelConfig {
    /// Create config for a specific provider
    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
        }
    }

    /// Provider with its default model
    pub fn for_provider(provider: LlmProvider) -> Self {
        Self::with_provider(provider, provider.default_model())
    }
}
