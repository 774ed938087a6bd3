//! # Single-Turn Chat
//!
//! A [`Pipeline`] that asks the LLM once and answers with its reply. Lets a
//! plain chat exchange go through [`RunBridge`](crate::bridge::RunBridge) and
//! stream its reasoning like any other run.

use async_trait::async_trait;
use std::sync::Arc;

use super::message::{Cause, MessageBus, PipelineMessage};
use super::pipeline::{Pipeline, RunBudget};
use crate::llm::LlmClient;

/// Author of chat replies
pub const ASSISTANT: &str = "Assistant";

pub struct SingleTurnChat {
    llm: Arc<dyn LlmClient>,
}

impl SingleTurnChat {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Pipeline for SingleTurnChat {
    async fn run(
        &self,
        goal: &str,
        _budget: RunBudget,
        bus: &MessageBus,
    ) -> anyhow::Result<Vec<PipelineMessage>> {
        let answer = self.llm.ask(goal).await?;
        let reply = PipelineMessage::new(ASSISTANT, Cause::label("Chat"), answer);
        bus.publish(reply.clone()).await?;
        Ok(vec![reply])
    }
}
