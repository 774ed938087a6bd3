//! # Conductor Core
//!
//! Streams multi-agent pipeline runs to remote callers and documents every
//! step of a run on disk.
//!
//! ## Architecture
//!
//! - `bridge/` - Run-scoped reasoning pipe, poller, runner and event stream
//! - `report/` - Artifact extraction and the step/final report recorder
//! - `swarm/` - Pipeline trait, message bus and the default role team
//! - `workspace/` - Read-only file catalog over the workspace
//! - `llm/` - LLM collaborator backed by radkit providers
//! - `models` - LLM provider configuration
//! - `config` - Persisted settings with environment overrides
//!
//! ## Usage
//!
//! ```rust,ignore
//! use conductor_core::bridge::RunBridge;
//! use conductor_core::swarm::{RoleTeam, RunRequest};
//!
//! let bridge = RunBridge::new(Arc::new(RoleTeam::new(llm)));
//! let mut events = bridge.stream_run(RunRequest::new("Build a todo app"));
//! while let Some(event) = events.next().await {
//!     println!("{:?}", event);
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod report;
pub mod swarm;
pub mod workspace;

pub use config::ConductorConfig;
pub use error::{CatalogError, ReportError};
