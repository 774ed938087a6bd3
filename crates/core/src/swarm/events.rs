//! # Stream Events
//!
//! Events delivered to the caller of a run, in the order they were produced.
//!
//! Wire form is `{"type": "<kind>", "content": "<payload>"}`; the terminal
//! sentinel serializes as `{"type":"done"}`.

use serde::{Deserialize, Serialize};

/// Kind of stream event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventKind {
    /// Lossy progress text from the LLM hook
    Reasoning,
    /// Final result of the pipeline
    Content,
    /// Lifecycle status ("completed")
    Status,
    /// Pipeline failure with diagnostic trace
    Error,
    /// Terminal sentinel
    Done,
}

/// An event on a run's output stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum StreamEvent {
    Reasoning(String),
    Content(String),
    Status(String),
    Error(String),
    Done,
}

impl StreamEvent {
    /// Status value posted after a successful run
    pub const COMPLETED: &'static str = "completed";

    pub fn completed() -> Self {
        StreamEvent::Status(Self::COMPLETED.to_string())
    }

    pub fn kind(&self) -> StreamEventKind {
        match self {
            StreamEvent::Reasoning(_) => StreamEventKind::Reasoning,
            StreamEvent::Content(_) => StreamEventKind::Content,
            StreamEvent::Status(_) => StreamEventKind::Status,
            StreamEvent::Error(_) => StreamEventKind::Error,
            StreamEvent::Done => StreamEventKind::Done,
        }
    }

    /// Text payload; empty for the sentinel
    pub fn payload(&self) -> &str {
        match self {
            StreamEvent::Reasoning(text)
            | StreamEvent::Content(text)
            | StreamEvent::Status(text)
            | StreamEvent::Error(text) => text,
            StreamEvent::Done => "",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StreamEvent::Done)
    }

    /// Whether this event reports the pipeline's outcome
    pub fn is_outcome(&self) -> bool {
        match self {
            StreamEvent::Status(status) => status == Self::COMPLETED,
            StreamEvent::Error(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_done_wire_format() {
        let json = serde_json::to_string(&StreamEvent::Done).unwrap();
        assert_eq!(json, r#"{"type":"done"}"#);
    }

    #[test]
    fn test_reasoning_wire_format() {
        let json = serde_json::to_string(&StreamEvent::Reasoning("thinking".into())).unwrap();
        assert_eq!(json, r#"{"type":"reasoning","content":"thinking"}"#);
    }

    #[test]
    fn test_kind_and_payload() {
        let event = StreamEvent::completed();
        assert_eq!(event.kind(), StreamEventKind::Status);
        assert_eq!(event.payload(), "completed");
        assert!(event.is_outcome());

        assert!(!StreamEvent::Status("running".into()).is_outcome());
        assert!(StreamEvent::Error("boom".into()).is_outcome());
        assert_eq!(StreamEvent::Done.payload(), "");
    }

    #[test]
    fn test_event_parses_from_wire() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"error","content":"boom"}"#).unwrap();
        assert_eq!(event, StreamEvent::Error("boom".into()));
    }
}
