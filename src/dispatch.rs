//! Hands a finished PDF to the OS printing executable.

use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PrintError;
use crate::process::ProcessSpec;

/// Placeholder replaced by the PDF path in configured printer arguments.
pub const PDF_PLACEHOLDER: &str = "{pdf}";

/// Arguments selecting silent output on the default printer.
pub fn default_args() -> Vec<String> {
    vec![
        "-print-to-default".into(),
        "-silent".into(),
        PDF_PLACEHOLDER.into(),
    ]
}

/// Diagnostics from a successful print run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintReceipt {
    /// The file that was printed.
    pub pdf_path: PathBuf,
    /// Tail of the printer program's stdout.
    pub stdout: String,
    /// Tail of the printer program's stderr.
    pub stderr: String,
    /// Time the printer program ran.
    pub duration_ms: u128,
}

/// Hands a finished PDF to the operating system's printing path.
pub trait PrintDispatcher: Send + Sync {
    /// Resolves once the printer program has accepted (or rejected) the file.
    fn print(&self, pdf_path: &Path) -> impl Future<Output = Result<PrintReceipt, PrintError>> + Send;
}

/// Runs an external executable against the PDF.
///
/// Success is decided by the exit status alone; output is only kept for
/// diagnostics.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandDispatcher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, pdf_path: &Path) -> ProcessSpec {
        let mut args: Vec<OsString> = Vec::with_capacity(self.args.len() + 1);
        let mut placed = false;
        for arg in &self.args {
            if arg == PDF_PLACEHOLDER {
                args.push(pdf_path.as_os_str().to_owned());
                placed = true;
            } else {
                args.push(arg.into());
            }
        }
        if !placed {
            args.push(pdf_path.as_os_str().to_owned());
        }
        ProcessSpec::new(&self.program).args(args)
    }
}

impl PrintDispatcher for CommandDispatcher {
    async fn print(&self, pdf_path: &Path) -> Result<PrintReceipt, PrintError> {
        let spec = self.command(pdf_path);
        tracing::info!(program = %spec.display_program(), pdf = %pdf_path.display(), "dispatching to printer");

        let out = spec.run().await.map_err(|e| {
            PrintError::PrintProcess(format!("cannot start {}: {e}", spec.display_program()))
        })?;

        let stdout = out.stdout_tail();
        let stderr = out.stderr_tail();
        if !stdout.is_empty() {
            tracing::debug!(%stdout, "printer stdout");
        }
        if !stderr.is_empty() {
            tracing::debug!(%stderr, "printer stderr");
        }

        if !out.success() {
            return Err(PrintError::PrintProcess(format!(
                "{} ended with {}: {stderr}",
                spec.display_program(),
                out.describe_exit()
            )));
        }

        Ok(PrintReceipt {
            pdf_path: pdf_path.to_path_buf(),
            stdout,
            stderr,
            duration_ms: out.duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureTag;

    fn args_of(spec: &ProcessSpec) -> Vec<String> {
        spec.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn default_arguments_select_silent_default_printer() {
        let d = CommandDispatcher::new("SumatraPDF.exe", default_args());
        let spec = d.command(Path::new("/docs/print-test/j/test.pdf"));
        assert_eq!(
            args_of(&spec),
            vec!["-print-to-default", "-silent", "/docs/print-test/j/test.pdf"]
        );
    }

    #[test]
    fn pdf_is_appended_without_placeholder() {
        let d = CommandDispatcher::new("lp", vec!["-d".into(), "label".into()]);
        let spec = d.command(Path::new("/tmp/test.pdf"));
        assert_eq!(args_of(&spec), vec!["-d", "label", "/tmp/test.pdf"]);
    }

    #[tokio::test]
    async fn missing_executable_is_print_process_error() {
        let d = CommandDispatcher::new("/definitely/not/SumatraPDF.exe", default_args());
        let err = d.print(Path::new("/tmp/test.pdf")).await.unwrap_err();
        assert_eq!(err.tag(), FailureTag::PrintProcessError);
        assert!(err.to_string().contains("cannot start"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_status_decides_outcome() {
        let ok = CommandDispatcher::new(
            "sh",
            vec!["-c".into(), "echo spooled; echo 'warning: ignored' >&2".into(), PDF_PLACEHOLDER.into()],
        );
        let receipt = ok.print(Path::new("/tmp/test.pdf")).await.unwrap();
        assert_eq!(receipt.stdout, "spooled");
        assert_eq!(receipt.stderr, "warning: ignored");

        let bad = CommandDispatcher::new("sh", vec!["-c".into(), "echo printed; exit 2".into()]);
        let err = bad.print(Path::new("/tmp/test.pdf")).await.unwrap_err();
        assert!(matches!(err, PrintError::PrintProcess(_)));
        assert!(err.to_string().contains("exit code 2"));
    }
}
