//! # File Catalog
//!
//! Read-only view over the workspace directory. Nothing is cached; every call
//! reflects what is on disk.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::CatalogError;

/// Workspace root: `CONDUCTOR_WORKSPACE`, or `./workspace`
pub fn workspace_root() -> PathBuf {
    if let Ok(path) = std::env::var("CONDUCTOR_WORKSPACE") {
        return PathBuf::from(path);
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("workspace")
}

/// A regular file under the workspace root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceFile {
    pub name: String,
    /// Relative to the workspace root, `/`-separated
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct FileCatalog {
    root: PathBuf,
}

impl FileCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every regular file under the root, sorted by path.
    ///
    /// A missing root lists as empty. Unreadable entries are skipped.
    pub fn list(&self) -> Vec<WorkspaceFile> {
        if !self.root.is_dir() {
            return Vec::new();
        }

        let mut files: Vec<WorkspaceFile> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&self.root).ok()?;
                let size = entry.metadata().ok()?.len();
                Some(WorkspaceFile {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    path: relative_display(relative),
                    size,
                })
            })
            .collect();

        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    /// Join `relative` onto the root, refusing absolute paths and `..`.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, CatalogError> {
        let candidate = Path::new(relative);
        let mut resolved = self.root.clone();

        for component in candidate.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(CatalogError::OutsideWorkspace(relative.to_string()));
                }
            }
        }

        Ok(resolved)
    }

    /// Bytes of the file at `relative`
    pub async fn read(&self, relative: &str) -> Result<Vec<u8>, CatalogError> {
        let path = self.resolve(relative)?;
        read_file(&path).await
    }
}

/// Bytes of a regular file; anything else is `NotFound`.
async fn read_file(path: &Path) -> Result<Vec<u8>, CatalogError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(tokio::fs::read(path).await?),
        Ok(_) => Err(CatalogError::NotFound(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(CatalogError::NotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

fn relative_display(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
