//! # Streaming Bridge
//!
//! Runs a pipeline in the background and exposes its output as one ordered,
//! cancellable stream of events.
//!
//! ```text
//! pipeline ─ runner ──────┐
//!                         ├─> queue ─> multiplexer ─> caller
//! LLM hook ─ pipe ─ poller┘
//! ```

mod multiplexer;
mod poller;
mod runner;
pub mod stream_pipe;

pub use multiplexer::{BridgeOptions, DisconnectPolicy, EventStream, RunBridge};
pub use poller::DEFAULT_POLL_INTERVAL;
pub use stream_pipe::{log_llm_stream, StreamPipe};
