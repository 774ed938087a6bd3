//! # Files API
//!
//! Read-only access to the workspace catalog.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use conductor_core::workspace::WorkspaceFile;
use conductor_core::CatalogError;
use serde::Serialize;
use utoipa::ToSchema;

use crate::SharedState;

#[derive(Debug, Serialize, ToSchema)]
pub struct FileEntry {
    pub name: String,
    /// Relative to the workspace root
    pub path: String,
    pub size: u64,
}

impl From<WorkspaceFile> for FileEntry {
    fn from(file: WorkspaceFile) -> Self {
        Self {
            name: file.name,
            path: file.path,
            size: file.size,
        }
    }
}

/// List every file in the workspace
#[utoipa::path(
    get,
    path = "/api/v1/files",
    tag = "files",
    responses(
        (status = 200, description = "Workspace files", body = Vec<FileEntry>)
    )
)]
pub async fn list_files(State(state): State<SharedState>) -> Json<Vec<FileEntry>> {
    let catalog = state.catalog.clone();
    let files = tokio::task::spawn_blocking(move || catalog.list())
        .await
        .unwrap_or_else(|e| {
            tracing::error!("file listing task failed: {}", e);
            Vec::new()
        });
    Json(files.into_iter().map(FileEntry::from).collect())
}

/// Raw bytes of one workspace file
#[utoipa::path(
    get,
    path = "/api/v1/files/{path}",
    tag = "files",
    params(("path" = String, Path, description = "Path relative to the workspace root")),
    responses(
        (status = 200, description = "File content"),
        (status = 400, description = "Path leaves the workspace"),
        (status = 404, description = "No such file")
    )
)]
pub async fn get_file(
    State(state): State<SharedState>,
    Path(path): Path<String>,
) -> Response<Body> {
    let relative = path.trim_start_matches('/');

    match state.catalog.read(relative).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(relative).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.to_string())], bytes).into_response()
        }
        Err(CatalogError::NotFound(_)) => (StatusCode::NOT_FOUND, "File not found").into_response(),
        Err(e @ CatalogError::OutsideWorkspace(_)) => {
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Err(e) => {
            tracing::error!("failed to read {}: {}", relative, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response()
        }
    }
}
