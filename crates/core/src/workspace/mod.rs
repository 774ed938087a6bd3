//! # Workspace
//!
//! The directory a run's artifacts live in.

mod catalog;

pub use catalog::{workspace_root, FileCatalog, WorkspaceFile};
