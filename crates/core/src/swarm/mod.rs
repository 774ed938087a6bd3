//! # Swarm Orchestration
//!
//! The pipeline a run drives, the messages its roles exchange, and the events
//! a run streams back to the caller.
//!
//! ## Pipeline Flow
//!
//! ```text
//! User Goal → Product Manager → Architect → Project Manager → Engineer
//! ```

pub mod chat;
pub mod events;
pub mod message;
pub mod pipeline;
pub mod team;

pub use chat::SingleTurnChat;
pub use events::{StreamEvent, StreamEventKind};
pub use message::{Cause, MessageBus, MessageObserver, PipelineMessage, SharedObserver};
pub use pipeline::{Pipeline, RunBudget, RunRequest};
pub use team::{CostLedger, RoleTeam, TeamStage};
