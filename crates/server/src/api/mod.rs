//! # HTTP API
//!
//! Handlers grouped by resource.

pub mod chat;
pub mod files;
pub mod run;
pub mod system;
