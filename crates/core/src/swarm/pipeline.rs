//! # Pipeline Collaborator
//!
//! The multi-agent pipeline a run drives. The bridge only needs to start it
//! with a goal and a budget; every message the pipeline produces must be
//! published on the bus it is handed so observers (the report recorder) see it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::message::{MessageBus, PipelineMessage};

/// Round and spending limits for one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunBudget {
    /// Maximum number of pipeline rounds
    pub n_round: u32,
    /// Spending cap in dollars
    pub investment: f64,
}

impl Default for RunBudget {
    fn default() -> Self {
        Self {
            n_round: 5,
            investment: 3.0,
        }
    }
}

/// A caller's request to start a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Free-text goal for the pipeline
    pub goal: String,
    #[serde(default)]
    pub budget: RunBudget,
}

impl RunRequest {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            budget: RunBudget::default(),
        }
    }

    pub fn with_budget(mut self, budget: RunBudget) -> Self {
        self.budget = budget;
        self
    }
}

/// A multi-agent pipeline invocable with a goal and a budget
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Run to completion and return the message history. The last message
    /// carries the final result.
    async fn run(
        &self,
        goal: &str,
        budget: RunBudget,
        bus: &MessageBus,
    ) -> anyhow::Result<Vec<PipelineMessage>>;
}
