//! # Pipeline Messages
//!
//! Messages exchanged by the roles of a pipeline, and the bus they travel on.
//!
//! Observers subscribe to a [`MessageBus`]; every published message is handed
//! to each observer in subscription order. An observer may answer with a reply,
//! which is published on the same bus after the current message.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// What caused a message to be produced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cause {
    /// An action identifier, possibly a dotted path ("actions.WritePRD")
    Action(String),
    /// Free-text label
    Label(String),
    Unlabeled,
}

impl Cause {
    pub fn action(name: impl Into<String>) -> Self {
        Cause::Action(name.into())
    }

    pub fn label(text: impl Into<String>) -> Self {
        Cause::Label(text.into())
    }
}

/// A message on the pipeline's bus
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineMessage {
    pub id: Uuid,
    /// Role that produced the message
    pub author: String,
    pub cause: Cause,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl PipelineMessage {
    pub fn new(author: impl Into<String>, cause: Cause, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            author: author.into(),
            cause,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Receives every message published on a bus
#[async_trait]
pub trait MessageObserver: Send {
    /// Handle one message. A returned reply is published after it.
    async fn on_message(
        &mut self,
        message: &PipelineMessage,
    ) -> anyhow::Result<Option<PipelineMessage>>;
}

pub type SharedObserver = Arc<tokio::sync::Mutex<dyn MessageObserver>>;

/// Fan-out bus for one run's pipeline messages
#[derive(Default)]
pub struct MessageBus {
    observers: Mutex<Vec<SharedObserver>>,
    history: Mutex<Vec<PipelineMessage>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer for all later messages
    pub fn subscribe(&self, observer: SharedObserver) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Deliver `message` and any replies it provokes.
    ///
    /// An observer error aborts delivery and is returned to the publisher;
    /// messages delivered before the failure stay in the history.
    pub async fn publish(&self, message: PipelineMessage) -> anyhow::Result<()> {
        let mut pending = VecDeque::from([message]);

        while let Some(message) = pending.pop_front() {
            let observers = self
                .observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();

            tracing::debug!(
                author = %message.author,
                observers = observers.len(),
                "publishing pipeline message"
            );

            for observer in observers {
                let reply = observer.lock().await.on_message(&message).await?;
                if let Some(reply) = reply {
                    pending.push_back(reply);
                }
            }

            self.history
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(message);
        }

        Ok(())
    }

    /// Every message delivered so far, replies included
    pub fn history(&self) -> Vec<PipelineMessage> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echoes every message not written by itself
    struct Echo {
        seen: Vec<String>,
    }

    #[async_trait]
    impl MessageObserver for Echo {
        async fn on_message(
            &mut self,
            message: &PipelineMessage,
        ) -> anyhow::Result<Option<PipelineMessage>> {
            self.seen.push(message.content.clone());
            if message.author == "echo" {
                return Ok(None);
            }
            Ok(Some(PipelineMessage::new(
                "echo",
                Cause::label("echo"),
                format!("echo: {}", message.content),
            )))
        }
    }

    struct Failing;

    #[async_trait]
    impl MessageObserver for Failing {
        async fn on_message(
            &mut self,
            _message: &PipelineMessage,
        ) -> anyhow::Result<Option<PipelineMessage>> {
            anyhow::bail!("disk full")
        }
    }

    #[test]
    fn test_message_creation() {
        let msg = PipelineMessage::new("Architect", Cause::action("WriteDesign"), "design");
        let other = PipelineMessage::new("Architect", Cause::action("WriteDesign"), "design");
        assert_eq!(msg.author, "Architect");
        assert_ne!(msg.id, other.id);
    }

    #[test]
    fn test_cause_serialization() {
        let json = serde_json::to_string(&Cause::action("WritePRD")).unwrap();
        assert_eq!(json, r#"{"kind":"action","value":"WritePRD"}"#);
        let json = serde_json::to_string(&Cause::Unlabeled).unwrap();
        assert_eq!(json, r#"{"kind":"unlabeled"}"#);
    }

    #[tokio::test]
    async fn test_replies_are_published_after_message() {
        let bus = MessageBus::new();
        let echo = Arc::new(tokio::sync::Mutex::new(Echo { seen: Vec::new() }));
        bus.subscribe(echo.clone());

        bus.publish(PipelineMessage::new("PM", Cause::action("WritePRD"), "prd"))
            .await
            .unwrap();

        let history: Vec<String> = bus.history().into_iter().map(|m| m.content).collect();
        assert_eq!(history, vec!["prd", "echo: prd"]);
        assert_eq!(echo.lock().await.seen, vec!["prd", "echo: prd"]);
    }

    #[tokio::test]
    async fn test_observer_error_reaches_publisher() {
        let bus = MessageBus::new();
        bus.subscribe(Arc::new(tokio::sync::Mutex::new(Failing)));

        let err = bus
            .publish(PipelineMessage::new("PM", Cause::Unlabeled, "prd"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert!(bus.history().is_empty());
    }
}
