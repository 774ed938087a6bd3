//! # Configuration
//!
//! Settings persisted in `.conductor/config.json`. Every field has a default,
//! so a partial (or missing) file is fine. Environment variables win over the
//! file:
//!
//! - `CONDUCTOR_WORKSPACE` - workspace root
//! - `CONDUCTOR_PROVIDER` - LLM provider name
//! - `CONDUCTOR_MODEL` - model identifier
//! - `CONDUCTOR_BASE_URL` - custom endpoint (OpenAI-compatible providers)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bridge::{BridgeOptions, DisconnectPolicy};
use crate::models::{LlmProvider, ModelConfig};
use crate::swarm::RunBudget;
use crate::workspace::workspace_root;

/// Default location of the config file
pub const CONFIG_PATH: &str = ".conductor/config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorConfig {
    /// Directory runs write their artifacts and reports into
    pub workspace: PathBuf,
    pub model: ModelConfig,
    pub n_round: u32,
    /// Spending cap per run in dollars
    pub investment: f64,
    /// Charged against `investment` for every LLM call the team makes
    pub cost_per_call: f64,
    pub poll_interval_ms: u64,
    pub queue_capacity: usize,
    pub disconnect_policy: DisconnectPolicy,
    /// Subscribe the report recorder to every run
    pub record_steps: bool,
    pub report_language: String,
    pub port: u16,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            workspace: workspace_root(),
            model: ModelConfig::default(),
            n_round: 5,
            investment: 3.0,
            cost_per_call: 0.05,
            poll_interval_ms: 100,
            queue_capacity: 256,
            disconnect_policy: DisconnectPolicy::Detach,
            record_steps: true,
            report_language: "English".to_string(),
            port: 8001,
        }
    }
}

impl ConductorConfig {
    /// Load from [`CONFIG_PATH`] and apply environment overrides
    pub async fn load() -> Result<Self> {
        let mut config = Self::load_from(Path::new(CONFIG_PATH)).await;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read a config file. Missing or malformed files yield the defaults.
    pub async fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("could not read config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config: {:?}", path))
    }

    /// Apply overrides looked up through `var`.
    ///
    /// Switching provider without naming a model selects that provider's
    /// default model.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(workspace) = var("CONDUCTOR_WORKSPACE") {
            self.workspace = PathBuf::from(workspace);
        }
        if let Some(provider) = var("CONDUCTOR_PROVIDER") {
            let provider: LlmProvider = provider.parse()?;
            if provider != self.model.provider {
                let base_url = self.model.base_url.take();
                self.model = ModelConfig::for_provider(provider);
                self.model.base_url = base_url;
            }
        }
        if let Some(model) = var("CONDUCTOR_MODEL") {
            self.model.model = model;
        }
        if let Some(base_url) = var("CONDUCTOR_BASE_URL") {
            if !self.model.provider.supports_base_url() {
                tracing::warn!(
                    "{} does not take a custom base URL, ignoring {}",
                    self.model.provider.display_name(),
                    base_url
                );
            } else {
                self.model.base_url = Some(base_url);
            }
        }
        Ok(())
    }

    pub fn budget(&self) -> RunBudget {
        RunBudget {
            n_round: self.n_round,
            investment: self.investment,
        }
    }

    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            queue_capacity: self.queue_capacity,
            disconnect_policy: self.disconnect_policy,
        }
    }
}
