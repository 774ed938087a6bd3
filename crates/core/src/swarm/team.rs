//! # Role Team
//!
//! Default [`Pipeline`]: a software team of four roles handing work down a
//! fixed chain.
//!
//! ```text
//! UserRequirement → Product Manager → Architect → Project Manager → Engineer ⟲
//! ```
//!
//! One role acts per round. The Engineer keeps the last stage until it emits
//! an end command or the rounds run out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::message::{Cause, MessageBus, PipelineMessage};
use super::pipeline::{Pipeline, RunBudget};
use crate::llm::LlmClient;
use crate::report::is_completion_signal;

const PRODUCT_MANAGER_PROMPT: &str = include_str!("defaults/product_manager.md");
const ARCHITECT_PROMPT: &str = include_str!("defaults/architect.md");
const PROJECT_MANAGER_PROMPT: &str = include_str!("defaults/project_manager.md");
const ENGINEER_PROMPT: &str = include_str!("defaults/engineer.md");

/// Author of the opening requirement message
pub const HUMAN: &str = "Human";

/// Stage of the team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamStage {
    /// Product Manager writing the PRD
    Requirements,
    /// Architect writing the system design
    Design,
    /// Project Manager breaking the design into tasks
    Tasks,
    /// Engineer writing code, possibly over several rounds
    Engineering,
    Complete,
}

impl TeamStage {
    /// Role acting in this stage
    pub fn role(&self) -> Option<&'static str> {
        match self {
            TeamStage::Requirements => Some("Product Manager"),
            TeamStage::Design => Some("Architect"),
            TeamStage::Tasks => Some("Project Manager"),
            TeamStage::Engineering => Some("Engineer"),
            TeamStage::Complete => None,
        }
    }

    /// Action the role's message is attributed to
    pub fn action(&self) -> Option<&'static str> {
        match self {
            TeamStage::Requirements => Some("WritePRD"),
            TeamStage::Design => Some("WriteDesign"),
            TeamStage::Tasks => Some("WriteTasks"),
            TeamStage::Engineering => Some("WriteCode"),
            TeamStage::Complete => None,
        }
    }

    fn prompt_template(&self) -> Option<&'static str> {
        match self {
            TeamStage::Requirements => Some(PRODUCT_MANAGER_PROMPT),
            TeamStage::Design => Some(ARCHITECT_PROMPT),
            TeamStage::Tasks => Some(PROJECT_MANAGER_PROMPT),
            TeamStage::Engineering => Some(ENGINEER_PROMPT),
            TeamStage::Complete => None,
        }
    }

    /// Stage after this one. Engineering only ends once the work is done.
    pub fn next(self, work_done: bool) -> TeamStage {
        match self {
            TeamStage::Requirements => TeamStage::Design,
            TeamStage::Design => TeamStage::Tasks,
            TeamStage::Tasks => TeamStage::Engineering,
            TeamStage::Engineering if work_done => TeamStage::Complete,
            TeamStage::Engineering => TeamStage::Engineering,
            TeamStage::Complete => TeamStage::Complete,
        }
    }
}

/// Running spend against the run's investment
#[derive(Debug, Clone, PartialEq)]
pub struct CostLedger {
    pub spent: f64,
    pub cap: f64,
}

impl CostLedger {
    pub fn new(cap: f64) -> Self {
        Self { spent: 0.0, cap }
    }

    /// Record one call, failing if it would exceed the cap
    pub fn charge(&mut self, cost: f64) -> anyhow::Result<()> {
        let next = self.spent + cost;
        if next > self.cap + f64::EPSILON {
            anyhow::bail!(
                "budget exhausted: spent ${:.2} of ${:.2}, next call costs ${:.2}",
                self.spent,
                self.cap,
                cost
            );
        }
        self.spent = next;
        Ok(())
    }
}

/// Four-role software team driven by one LLM
pub struct RoleTeam {
    llm: Arc<dyn LlmClient>,
    cost_per_call: f64,
}

impl RoleTeam {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            cost_per_call: 0.05,
        }
    }

    pub fn with_cost_per_call(mut self, cost: f64) -> Self {
        self.cost_per_call = cost;
        self
    }
}

fn render_prompt(template: &str, goal: &str, history: &[PipelineMessage]) -> String {
    let history_text = history
        .iter()
        .map(|msg| format!("### {}\n{}", msg.author, msg.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    template
        .replace("{{goal}}", goal)
        .replace("{{history}}", &history_text)
}

#[async_trait]
impl Pipeline for RoleTeam {
    #[tracing::instrument(skip_all, fields(n_round = budget.n_round))]
    async fn run(
        &self,
        goal: &str,
        budget: RunBudget,
        bus: &MessageBus,
    ) -> anyhow::Result<Vec<PipelineMessage>> {
        let mut ledger = CostLedger::new(budget.investment);
        let mut stage = TeamStage::Requirements;
        let mut history = Vec::new();

        let requirement = PipelineMessage::new(HUMAN, Cause::action("UserRequirement"), goal);
        bus.publish(requirement.clone()).await?;
        history.push(requirement);

        for round in 1..=budget.n_round {
            let (Some(role), Some(action), Some(template)) =
                (stage.role(), stage.action(), stage.prompt_template())
            else {
                break;
            };

            ledger.charge(self.cost_per_call)?;
            tracing::info!(round, role, spent = ledger.spent, "role acting");

            let prompt = render_prompt(template, goal, &history);
            let reply = self.llm.ask(&prompt).await?;
            let work_done = stage == TeamStage::Engineering && is_completion_signal(&reply);

            let message = PipelineMessage::new(role, Cause::action(action), reply);
            bus.publish(message.clone()).await?;
            history.push(message);

            stage = stage.next(work_done);
        }

        if stage != TeamStage::Complete {
            tracing::warn!(?stage, "rounds ran out before the team finished");
        }

        Ok(history)
    }
}
