use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::state_machine::{JobId, Stage};

/// Errors outside a job's own stages: the request channel and job bookkeeping.
#[derive(Debug, Error)]
pub enum BadgeprintError {
    #[error("Invalid request: {0}")]
    Request(String),

    #[error("job {0} is already running")]
    DuplicateJob(JobId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by a pipeline stage. Each one ends the job.
#[derive(Debug, Error)]
pub enum PrintError {
    #[error("render failed: {0}")]
    Render(String),

    #[error("PDF conversion failed: {0}")]
    Conversion(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("print process failed: {0}")]
    PrintProcess(String),

    #[error("{stage} stage timed out after {}ms", .limit.as_millis())]
    Timeout { stage: Stage, limit: Duration },

    #[error("job cancelled")]
    Cancelled,
}

impl PrintError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PrintError::Io {
            path: path.into(),
            source,
        }
    }

    /// The tag reported to the requester when this error ends a job.
    pub fn tag(&self) -> FailureTag {
        match self {
            PrintError::Render(_) => FailureTag::RenderError,
            PrintError::Conversion(_) => FailureTag::ConversionError,
            PrintError::Io { .. } => FailureTag::IoError,
            PrintError::PrintProcess(_) => FailureTag::PrintProcessError,
            PrintError::Timeout { stage, .. } => stage.failure_tag(),
            PrintError::Cancelled => FailureTag::Cancelled,
        }
    }
}

/// Reason a job ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureTag {
    /// The rendering surface did not produce a complete page.
    RenderError,
    /// Page-to-PDF conversion failed or produced the wrong geometry.
    ConversionError,
    /// An artifact could not be written.
    IoError,
    /// The printing executable was missing, unspawnable or exited non-zero.
    PrintProcessError,
    /// The job was cancelled by id.
    Cancelled,
}

impl std::fmt::Display for FailureTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureTag::RenderError => write!(f, "render-error"),
            FailureTag::ConversionError => write!(f, "conversion-error"),
            FailureTag::IoError => write!(f, "io-error"),
            FailureTag::PrintProcessError => write!(f, "print-process-error"),
            FailureTag::Cancelled => write!(f, "cancelled"),
        }
    }
}
