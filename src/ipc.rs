//! JSON-lines request/response channel between a front end and the
//! coordinator.
//!
//! Each line read is one [`Request`]; each line written is one [`Response`].
//! A `print` request is answered with `accepted` right away and later with
//! exactly one `printed` or `pdf-failed` carrying the same job id.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::convert::PdfConverter;
use crate::coordinator::{JobCoordinator, Outcome};
use crate::dispatch::PrintDispatcher;
use crate::error::{BadgeprintError, FailureTag};
use crate::render::PageRenderer;
use crate::state_machine::JobId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    /// Print `markup`, or the configured badge when absent.
    Print {
        #[serde(default)]
        markup: Option<String>,
    },
    Cancel {
        job_id: JobId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Response {
    Accepted {
        job_id: JobId,
    },
    Printed {
        job_id: JobId,
        pdf_path: PathBuf,
    },
    #[serde(rename = "pdf-failed")]
    Failed {
        job_id: JobId,
        reason: FailureTag,
        message: String,
    },
    CancelResult {
        job_id: JobId,
        cancelled: bool,
    },
    Error {
        message: String,
    },
}

impl From<Outcome> for Response {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Printed { job_id, pdf_path } => Response::Printed { job_id, pdf_path },
            Outcome::Failed {
                job_id,
                reason,
                message,
            } => Response::Failed {
                job_id,
                reason,
                message,
            },
        }
    }
}

pub fn parse_request(line: &str) -> Result<Request, BadgeprintError> {
    serde_json::from_str(line).map_err(|e| BadgeprintError::Request(e.to_string()))
}

/// Serves requests from `reader` until end of input, then waits for the jobs
/// still running and returns the writer.
pub async fn serve<R, C, D, In, Out>(
    coordinator: Arc<JobCoordinator<R, C, D>>,
    default_markup: String,
    reader: In,
    writer: Out,
) -> Result<Out, BadgeprintError>
where
    R: PageRenderer + 'static,
    C: PdfConverter + 'static,
    D: PrintDispatcher + 'static,
    In: AsyncBufRead + Unpin,
    Out: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<Response>();
    let writer_task = tokio::spawn(write_responses(rx, writer));
    let mut jobs = JoinSet::new();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request = match parse_request(&line) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "rejected request");
                let _ = tx.send(Response::Error {
                    message: e.to_string(),
                });
                continue;
            }
        };

        match request {
            Request::Print { markup } => {
                let reservation = match coordinator.reserve(JobId::new()) {
                    Ok(reservation) => reservation,
                    Err(e) => {
                        let _ = tx.send(Response::Error {
                            message: e.to_string(),
                        });
                        continue;
                    }
                };
                let markup = markup.unwrap_or_else(|| default_markup.clone());
                // Registered before the reply, so a cancel for this id always finds it.
                let _ = tx.send(Response::Accepted {
                    job_id: reservation.id(),
                });

                let coordinator = Arc::clone(&coordinator);
                let tx = tx.clone();
                jobs.spawn(async move {
                    let outcome = coordinator.submit_reserved(reservation, markup).await;
                    let _ = tx.send(outcome.into());
                });
            }
            Request::Cancel { job_id } => {
                let cancelled = coordinator.cancel(job_id);
                let _ = tx.send(Response::CancelResult { job_id, cancelled });
            }
        }
    }

    while let Some(res) = jobs.join_next().await {
        if let Err(e) = res {
            tracing::error!(error = %e, "print task aborted");
        }
    }
    drop(tx);

    writer_task
        .await
        .map_err(|e| BadgeprintError::Io(std::io::Error::other(e)))?
}

async fn write_responses<Out>(
    mut rx: mpsc::UnboundedReceiver<Response>,
    mut writer: Out,
) -> Result<Out, BadgeprintError>
where
    Out: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(writer)
}
