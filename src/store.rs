//! Artifact storage. Every job owns `<root>/<job-id>/` and nothing else.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::PrintError;
use crate::state_machine::JobId;

/// Rendered source written for the surface to load.
pub const HTML_FILE: &str = "badge.html";
/// Converted output handed to the printer.
pub const PDF_FILE: &str = "test.pdf";

/// Owns the work root. Paths it hands out are always absolute.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// A relative `root` is resolved against the current directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<id>`, the only directory job `id` writes to.
    pub fn job_dir(&self, id: JobId) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Creates `dir` and its parents. An existing directory is fine.
    pub async fn ensure_dir(&self, dir: &Path) -> Result<(), PrintError> {
        match fs::create_dir_all(dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
            Err(e) => Err(PrintError::io(dir, e)),
        }
    }

    pub async fn write(&self, path: &Path, contents: impl AsRef<[u8]>) -> Result<(), PrintError> {
        fs::write(path, contents)
            .await
            .map_err(|e| PrintError::io(path, e))?;
        tracing::debug!(path = %path.display(), "artifact written");
        Ok(())
    }

    /// Removes a failed job's directory. A missing directory is not an error.
    pub async fn discard(&self, dir: &Path) -> Result<(), PrintError> {
        match fs::remove_dir_all(dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PrintError::io(dir, e)),
        }
    }
}
