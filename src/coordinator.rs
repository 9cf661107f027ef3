use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::Instrument;

use crate::config::PrintConfig;
use crate::convert::{ChromiumConverter, PdfConverter};
use crate::dispatch::{CommandDispatcher, PrintDispatcher};
use crate::error::{BadgeprintError, FailureTag, PrintError};
use crate::geometry::PageGeometry;
use crate::markup;
use crate::pdf::{self, PdfOptions};
use crate::render::{ChromiumRenderer, PageRenderer};
use crate::state_machine::{JobId, JobReport, PrintJob, Stage, StateMachine, TransitionError};
use crate::store::{FileStore, HTML_FILE, PDF_FILE};

/// Upper bound on each suspending stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDeadlines {
    /// Loading the page, resources included.
    pub render: Duration,
    /// Producing and reading back the PDF.
    pub convert: Duration,
    /// Waiting for the printing executable to exit.
    pub print: Duration,
}

impl Default for StageDeadlines {
    fn default() -> Self {
        Self {
            render: Duration::from_secs(20),
            convert: Duration::from_secs(20),
            print: Duration::from_secs(60),
        }
    }
}

impl StageDeadlines {
    pub fn for_stage(&self, stage: Stage) -> Duration {
        match stage {
            Stage::Render => self.render,
            Stage::Convert => self.convert,
            Stage::Print => self.print,
        }
    }
}

/// Terminal result of one job, sent back to the requester exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Outcome {
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
}

impl Outcome {
    pub fn job_id(&self) -> JobId {
        match self {
            Outcome::Printed { job_id, .. } | Outcome::Failed { job_id, .. } => *job_id,
        }
    }

    pub fn is_printed(&self) -> bool {
        matches!(self, Outcome::Printed { .. })
    }
}

/// Fires once; every clone observes it.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<watch::Sender<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self(Arc::new(tx))
    }

    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.0.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

type LiveJobs = Arc<Mutex<HashMap<JobId, CancelToken>>>;

/// A job id registered as live on a coordinator.
///
/// Cancellation by id reaches the job from the moment the reservation exists,
/// before the job has started running. Dropping it releases the id.
#[derive(Debug)]
pub struct Reservation {
    id: JobId,
    token: CancelToken,
    live: LiveJobs,
}

impl Reservation {
    pub fn id(&self) -> JobId {
        self.id
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let mut live = self.live.lock().unwrap_or_else(|e| e.into_inner());
        live.remove(&self.id);
    }
}

/// Drives print jobs through render, convert and print.
///
/// Stages of one job run strictly in order. Jobs are isolated by their own
/// artifact directory, so any number may run concurrently on one coordinator.
pub struct JobCoordinator<R, C, D> {
    renderer: R,
    converter: C,
    dispatcher: D,
    store: FileStore,
    geometry: PageGeometry,
    deadlines: StageDeadlines,
    keep_failed_artifacts: bool,
    live: LiveJobs,
}

impl<R, C, D> JobCoordinator<R, C, D>
where
    R: PageRenderer,
    C: PdfConverter,
    D: PrintDispatcher,
{
    pub fn new(renderer: R, converter: C, dispatcher: D, store: FileStore) -> Self {
        Self {
            renderer,
            converter,
            dispatcher,
            store,
            geometry: PageGeometry::badge(),
            deadlines: StageDeadlines::default(),
            keep_failed_artifacts: false,
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_deadlines(mut self, deadlines: StageDeadlines) -> Self {
        self.deadlines = deadlines;
        self
    }

    pub fn with_geometry(mut self, geometry: PageGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn keep_failed_artifacts(mut self, keep: bool) -> Self {
        self.keep_failed_artifacts = keep;
        self
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Registers `id` as live so it can be cancelled before the job starts.
    ///
    /// Fails if a job with the same id is still live.
    pub fn reserve(&self, id: JobId) -> Result<Reservation, BadgeprintError> {
        let mut live = self.live.lock().unwrap_or_else(|e| e.into_inner());
        match live.entry(id) {
            Entry::Occupied(_) => Err(BadgeprintError::DuplicateJob(id)),
            Entry::Vacant(slot) => {
                let token = CancelToken::new();
                slot.insert(token.clone());
                Ok(Reservation {
                    id,
                    token,
                    live: Arc::clone(&self.live),
                })
            }
        }
    }

    /// Runs one job under a fresh id and returns its terminal outcome.
    pub async fn submit(&self, markup: impl Into<String>) -> Outcome {
        let reservation = loop {
            if let Ok(reservation) = self.reserve(JobId::new()) {
                break reservation;
            }
        };
        self.submit_reserved(reservation, markup).await
    }

    /// Like [`submit`](Self::submit) under an id reserved by the caller, who
    /// may already have handed it out for cancellation.
    pub async fn submit_reserved(&self, reservation: Reservation, markup: impl Into<String>) -> Outcome {
        self.run(reservation, markup.into()).await.0
    }

    /// Runs one job and also returns its audit record.
    pub async fn run(&self, reservation: Reservation, markup: String) -> (Outcome, JobReport) {
        let id = reservation.id();
        let mut job = PrintJob::new(id, markup, self.store.job_dir(id), self.geometry);
        let span = tracing::info_span!("job", id = %id);

        let result = self
            .drive(&mut job, &reservation.token)
            .instrument(span.clone())
            .await;
        drop(reservation);

        let outcome = match result {
            Ok(pdf_path) => {
                tracing::info!(parent: &span, pdf = %pdf_path.display(), "job printed");
                Outcome::Printed { job_id: id, pdf_path }
            }
            Err(err) => {
                let reason = err.tag();
                note(StateMachine::fail(&mut job, reason));
                tracing::warn!(parent: &span, %reason, error = %err, "job failed");
                if !self.keep_failed_artifacts
                    && let Err(e) = self.store.discard(job.work_dir()).await
                {
                    tracing::warn!(parent: &span, error = %e, "could not remove partial artifacts");
                }
                Outcome::Failed {
                    job_id: id,
                    reason,
                    message: err.to_string(),
                }
            }
        };

        (outcome, JobReport::from_job(&job))
    }

    /// Cancels a live job. Returns `false` if no such job is running.
    pub fn cancel(&self, id: JobId) -> bool {
        let live = self.live.lock().unwrap_or_else(|e| e.into_inner());
        match live.get(&id) {
            Some(token) => {
                token.cancel();
                tracing::info!(job = %id, "cancellation requested");
                true
            }
            None => false,
        }
    }

    async fn drive(&self, job: &mut PrintJob, token: &CancelToken) -> Result<PathBuf, PrintError> {
        let dir = job.work_dir().to_path_buf();
        let geometry = *job.geometry();
        if !geometry.is_valid() {
            return Err(PrintError::Conversion(format!(
                "cannot lay out a page of {geometry}"
            )));
        }
        self.store.ensure_dir(&dir).await?;

        // RENDERING: persist the sized source, then wait for the surface to finish loading.
        note(StateMachine::advance(job));
        let source = dir.join(HTML_FILE);
        self.store
            .write(&source, markup::with_page_style(job.markup(), &geometry))
            .await?;
        let page = self
            .guarded(Stage::Render, token, self.renderer.render(&source, &geometry))
            .await?;
        note(StateMachine::advance(job));

        // CONVERTING
        note(StateMachine::advance(job));
        let options = PdfOptions::for_geometry(&geometry);
        let bytes = self
            .guarded(Stage::Convert, token, self.converter.to_pdf(&page, &options))
            .await?;
        let info = pdf::verify(&bytes, &options)?;
        let pdf_path = dir.join(PDF_FILE);
        self.store.write(&pdf_path, &bytes).await?;
        note(StateMachine::converted(job, pdf_path.clone()));
        tracing::debug!(
            width_pt = info.width_pt,
            height_pt = info.height_pt,
            orientation = %info.orientation,
            "PDF ready"
        );
        drop(page);

        // PRINTING
        note(StateMachine::advance(job));
        let receipt = self
            .guarded(Stage::Print, token, self.dispatcher.print(&pdf_path))
            .await?;
        tracing::debug!(ms = receipt.duration_ms, "printer accepted job");
        note(StateMachine::advance(job));

        Ok(pdf_path)
    }

    /// Runs one stage under its deadline, abandoning it if the job is cancelled.
    async fn guarded<T>(
        &self,
        stage: Stage,
        token: &CancelToken,
        work: impl Future<Output = Result<T, PrintError>>,
    ) -> Result<T, PrintError> {
        let limit = self.deadlines.for_stage(stage);
        tracing::debug!(%stage, limit_ms = limit.as_millis() as u64, "stage started");
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(PrintError::Cancelled),
            res = tokio::time::timeout(limit, work) => match res {
                Ok(res) => res,
                Err(_) => Err(PrintError::Timeout { stage, limit }),
            },
        }
    }
}

/// The coordinator wired to headless Chromium and the configured printer.
pub type BadgeCoordinator = JobCoordinator<ChromiumRenderer, ChromiumConverter, CommandDispatcher>;

impl BadgeCoordinator {
    pub fn from_config(config: &PrintConfig) -> Self {
        JobCoordinator::new(
            ChromiumRenderer::new(&config.browser_program, config.load_budget()),
            ChromiumConverter::new(&config.browser_program, config.load_budget()),
            CommandDispatcher::new(&config.printer_program, config.printer_args.clone()),
            FileStore::new(&config.work_root),
        )
        .with_deadlines(config.deadlines())
        .keep_failed_artifacts(config.keep_failed_artifacts)
    }
}

// Transitions are issued in pipeline order; a rejection means a sequencing bug.
fn note(res: Result<crate::state_machine::JobStatus, TransitionError>) {
    match res {
        Ok(status) => tracing::debug!(%status, "job status"),
        Err(e) => tracing::error!(error = %e, "rejected job transition"),
    }
}
