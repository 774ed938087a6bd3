//! # Errors
//!
//! Typed errors for the workspace catalog and the report recorder.
//! Pipeline and LLM flows use `anyhow` and wrap these where needed.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving or reading workspace files
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The path does not exist or is not a regular file
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// The requested path would leave the workspace root
    #[error("path escapes the workspace: {0}")]
    OutsideWorkspace(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while persisting step or final reports
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The LLM collaborator failed to summarize a step or synthesize the final report
    #[error("report summarization failed")]
    Llm(#[source] anyhow::Error),
}

impl ReportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
