//! Terminal feedback for the `print` command: a spinner while the job runs
//! and a coloured verdict when it ends.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::coordinator::Outcome;
use crate::state_machine::{JobId, JobReport, JobStatus};

/// Spinner shown while one print job runs.
///
/// The verdict is green for a printed badge and red with the failure tag
/// otherwise.
pub struct JobProgress {
    // Spinner drawn on stderr by indicatif.
    pb: ProgressBar,
    // Printed badges.
    green: Style,
    // Failed jobs.
    red: Style,
    // Secondary details such as the state path.
    dim: Style,
}

impl JobProgress {
    /// Starts the spinner for `job_id`.
    pub fn start(job_id: JobId) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(format!("printing badge {job_id}"));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            dim: Style::new().dim(),
        }
    }

    /// Clears the spinner and prints the outcome with the PDF path or the failure reason.
    pub fn complete(&self, outcome: &Outcome) {
        self.pb.finish_and_clear();
        match outcome {
            Outcome::Printed { pdf_path, .. } => {
                println!(
                    "  {} Printed {}",
                    self.green.apply_to("✓"),
                    pdf_path.display()
                );
            }
            Outcome::Failed {
                reason, message, ..
            } => {
                println!("  {} {reason}: {message}", self.red.apply_to("✗"));
            }
        }
    }

    /// Lists the states the job went through.
    pub fn print_report(&self, report: &JobReport) {
        let path: Vec<String> = report.transitions.iter().map(JobStatus::to_string).collect();
        println!(
            "  {} {} in {}ms",
            self.dim.apply_to("job"),
            path.join(" → "),
            report.duration_ms
        );
    }
}
