use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::job::PrintJob;
use crate::error::FailureTag;

/// Lifecycle of a print job.
///
/// Each job flows through: CREATED → RENDERING → RENDERED → CONVERTING →
/// CONVERTED → PRINTING → PRINTED, or drops into FAILED from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Created,
    Rendering,
    Rendered,
    Converting,
    Converted,
    Printing,
    Printed,
    Failed(FailureTag),
}

impl JobStatus {
    /// Position along the happy path. `Failed` has none.
    fn rank(self) -> Option<u8> {
        match self {
            JobStatus::Created => Some(0),
            JobStatus::Rendering => Some(1),
            JobStatus::Rendered => Some(2),
            JobStatus::Converting => Some(3),
            JobStatus::Converted => Some(4),
            JobStatus::Printing => Some(5),
            JobStatus::Printed => Some(6),
            JobStatus::Failed(_) => None,
        }
    }

    fn successor(self) -> Option<JobStatus> {
        match self {
            JobStatus::Created => Some(JobStatus::Rendering),
            JobStatus::Rendering => Some(JobStatus::Rendered),
            JobStatus::Rendered => Some(JobStatus::Converting),
            JobStatus::Converting => Some(JobStatus::Converted),
            JobStatus::Converted => Some(JobStatus::Printing),
            JobStatus::Printing => Some(JobStatus::Printed),
            JobStatus::Printed | JobStatus::Failed(_) => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Printed | JobStatus::Failed(_))
    }

    /// True once the job has produced its PDF and not failed.
    pub fn has_pdf(self) -> bool {
        self.rank()
            .is_some_and(|r| r >= JobStatus::Converted.rank().unwrap_or(u8::MAX))
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Created => write!(f, "CREATED"),
            JobStatus::Rendering => write!(f, "RENDERING"),
            JobStatus::Rendered => write!(f, "RENDERED"),
            JobStatus::Converting => write!(f, "CONVERTING"),
            JobStatus::Converted => write!(f, "CONVERTED"),
            JobStatus::Printing => write!(f, "PRINTING"),
            JobStatus::Printed => write!(f, "PRINTED"),
            JobStatus::Failed(tag) => write!(f, "FAILED({tag})"),
        }
    }
}

/// A pipeline stage that runs under its own deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Render,
    Convert,
    Print,
}

impl Stage {
    /// Tag used when this stage fails without a more specific error.
    pub fn failure_tag(self) -> FailureTag {
        match self {
            Stage::Render => FailureTag::RenderError,
            Stage::Convert => FailureTag::ConversionError,
            Stage::Print => FailureTag::PrintProcessError,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Render => write!(f, "render"),
            Stage::Convert => write!(f, "convert"),
            Stage::Print => write!(f, "print"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("job is already {0}")]
    Terminal(JobStatus),

    #[error("cannot move from {from} to {to}")]
    Illegal { from: JobStatus, to: JobStatus },
}

/// Moves a [`PrintJob`] forward. Every transition is checked against the
/// current status; a rejected transition leaves the job untouched.
pub struct StateMachine;

impl StateMachine {
    /// Advance to the next status on the happy path.
    ///
    /// Entering `Converted` needs the PDF location, so that step goes through
    /// [`StateMachine::converted`] instead.
    pub fn advance(job: &mut PrintJob) -> Result<JobStatus, TransitionError> {
        let from = job.status;
        let to = from.successor().ok_or(TransitionError::Terminal(from))?;
        if to == JobStatus::Converted {
            return Err(TransitionError::Illegal { from, to });
        }
        Self::apply(job, to);
        Ok(to)
    }

    /// `Converting → Converted`, recording where the PDF was written.
    pub fn converted(job: &mut PrintJob, pdf_path: PathBuf) -> Result<JobStatus, TransitionError> {
        let from = job.status;
        if from.is_terminal() {
            return Err(TransitionError::Terminal(from));
        }
        if from != JobStatus::Converting {
            return Err(TransitionError::Illegal {
                from,
                to: JobStatus::Converted,
            });
        }
        job.pdf_path = Some(pdf_path);
        Self::apply(job, JobStatus::Converted);
        Ok(JobStatus::Converted)
    }

    /// Drop into `Failed`. A failed job keeps no PDF path.
    pub fn fail(job: &mut PrintJob, tag: FailureTag) -> Result<JobStatus, TransitionError> {
        let from = job.status;
        if from.is_terminal() {
            return Err(TransitionError::Terminal(from));
        }
        let to = JobStatus::Failed(tag);
        job.pdf_path = None;
        Self::apply(job, to);
        Ok(to)
    }

    fn apply(job: &mut PrintJob, to: JobStatus) {
        job.history.push(job.status);
        job.status = to;
        job.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PageGeometry;
    use crate::state_machine::JobId;

    fn make_job() -> PrintJob {
        PrintJob::new(
            JobId::new(),
            "<p>badge</p>".into(),
            PathBuf::from("/tmp/print-test/job"),
            PageGeometry::badge(),
        )
    }

    fn walk_to_converting(job: &mut PrintJob) {
        StateMachine::advance(job).unwrap();
        StateMachine::advance(job).unwrap();
        StateMachine::advance(job).unwrap();
        assert_eq!(job.status(), JobStatus::Converting);
    }

    #[test]
    fn happy_path_walks_all_states() {
        let mut job = make_job();
        walk_to_converting(&mut job);
        assert!(job.pdf_path().is_none());

        let s = StateMachine::converted(&mut job, "/tmp/print-test/job/test.pdf".into()).unwrap();
        assert_eq!(s, JobStatus::Converted);
        assert!(job.pdf_path().is_some());

        assert_eq!(StateMachine::advance(&mut job).unwrap(), JobStatus::Printing);
        assert_eq!(StateMachine::advance(&mut job).unwrap(), JobStatus::Printed);
        assert!(job.status().is_terminal());

        assert_eq!(
            job.history(),
            &[
                JobStatus::Created,
                JobStatus::Rendering,
                JobStatus::Rendered,
                JobStatus::Converting,
                JobStatus::Converted,
                JobStatus::Printing,
            ]
        );
    }

    #[test]
    fn printed_is_terminal() {
        let mut job = make_job();
        walk_to_converting(&mut job);
        StateMachine::converted(&mut job, "x.pdf".into()).unwrap();
        StateMachine::advance(&mut job).unwrap();
        StateMachine::advance(&mut job).unwrap();

        assert_eq!(
            StateMachine::advance(&mut job),
            Err(TransitionError::Terminal(JobStatus::Printed))
        );
        assert!(StateMachine::fail(&mut job, FailureTag::IoError).is_err());
        assert_eq!(job.status(), JobStatus::Printed);
    }

    #[test]
    fn converted_needs_a_pdf_path() {
        let mut job = make_job();
        walk_to_converting(&mut job);
        let err = StateMachine::advance(&mut job).unwrap_err();
        assert_eq!(
            err,
            TransitionError::Illegal {
                from: JobStatus::Converting,
                to: JobStatus::Converted
            }
        );
        assert_eq!(job.status(), JobStatus::Converting);
    }

    #[test]
    fn converted_only_from_converting() {
        let mut job = make_job();
        StateMachine::advance(&mut job).unwrap();
        assert!(StateMachine::converted(&mut job, "x.pdf".into()).is_err());
        assert!(job.pdf_path().is_none());
        assert_eq!(job.status(), JobStatus::Rendering);
    }

    #[test]
    fn fail_from_any_live_state_is_terminal() {
        let mut job = make_job();
        walk_to_converting(&mut job);
        StateMachine::converted(&mut job, "x.pdf".into()).unwrap();
        StateMachine::advance(&mut job).unwrap();

        let s = StateMachine::fail(&mut job, FailureTag::PrintProcessError).unwrap();
        assert_eq!(s, JobStatus::Failed(FailureTag::PrintProcessError));
        assert!(job.pdf_path().is_none());

        assert!(StateMachine::advance(&mut job).is_err());
        assert!(StateMachine::fail(&mut job, FailureTag::IoError).is_err());
        assert_eq!(job.status(), JobStatus::Failed(FailureTag::PrintProcessError));
    }

    #[test]
    fn pdf_presence_follows_rank() {
        assert!(!JobStatus::Converting.has_pdf());
        assert!(JobStatus::Converted.has_pdf());
        assert!(JobStatus::Printed.has_pdf());
        assert!(!JobStatus::Failed(FailureTag::IoError).has_pdf());
    }

    #[test]
    fn status_display() {
        assert_eq!(JobStatus::Created.to_string(), "CREATED");
        assert_eq!(
            JobStatus::Failed(FailureTag::RenderError).to_string(),
            "FAILED(render-error)"
        );
        assert_eq!(Stage::Convert.to_string(), "convert");
    }
}
