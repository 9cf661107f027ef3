use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::JobStatus;
use crate::geometry::PageGeometry;

/// Opaque, unique job identifier. Also names the job's artifact directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A single print request, owned by the coordinator until its outcome is reported.
///
/// Status only moves through [`StateMachine`](super::StateMachine), which keeps
/// `pdf_path` set exactly when the status has reached `Converted`.
#[derive(Debug, Clone, Serialize)]
pub struct PrintJob {
    pub(super) id: JobId,
    pub(super) markup: String,
    pub(super) work_dir: PathBuf,
    pub(super) geometry: PageGeometry,
    pub(super) status: JobStatus,
    pub(super) pdf_path: Option<PathBuf>,
    pub(super) history: Vec<JobStatus>,
    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
}

impl PrintJob {
    pub fn new(id: JobId, markup: String, work_dir: PathBuf, geometry: PageGeometry) -> Self {
        let now = Utc::now();
        Self {
            id,
            markup,
            work_dir,
            geometry,
            status: JobStatus::Created,
            pdf_path: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn pdf_path(&self) -> Option<&Path> {
        self.pdf_path.as_deref()
    }

    /// Statuses the job has already left, oldest first.
    pub fn history(&self) -> &[JobStatus] {
        &self.history
    }
}

/// Structured audit record produced once a job has finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub status: JobStatus,
    pub transitions: Vec<JobStatus>,
    pub pdf_path: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl JobReport {
    pub fn from_job(job: &PrintJob) -> Self {
        let now = Utc::now();
        let mut transitions = job.history.clone();
        transitions.push(job.status);

        Self {
            job_id: job.id,
            status: job.status,
            transitions,
            pdf_path: job.pdf_path.clone(),
            started_at: job.created_at,
            completed_at: now,
            duration_ms: (now - job.created_at).num_milliseconds(),
        }
    }
}
