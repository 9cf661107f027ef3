//! External process execution shared by the browser surface and the print
//! dispatcher.
//!
//! Children are spawned with `kill_on_drop`, so dropping the future (deadline
//! hit, job cancelled) also tears the process down.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Bytes kept from stdout/stderr when quoting them in errors.
const TAIL_BYTES: usize = 512;

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Runs the process to completion, capturing stdout and stderr.
    ///
    /// Only a failure to spawn or to collect output is an `Err`; a non-zero
    /// exit is reported through [`ProcessOutput`].
    pub async fn run(&self) -> std::io::Result<ProcessOutput> {
        let start = Instant::now();
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
            duration_ms: start.elapsed().as_millis(),
        })
    }

    pub fn display_program(&self) -> String {
        self.program.display().to_string()
    }
}

/// What a finished process left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutput {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Everything written to stdout.
    pub stdout: Vec<u8>,
    /// Everything written to stderr.
    pub stderr: Vec<u8>,
    /// Wall time from spawn to exit.
    pub duration_ms: u128,
}

impl ProcessOutput {
    /// Exited normally with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Last bytes of stdout, trimmed, for log lines and error messages.
    pub fn stdout_tail(&self) -> String {
        tail(&self.stdout)
    }

    pub fn stderr_tail(&self) -> String {
        tail(&self.stderr)
    }

    /// `exit code N` or `killed by signal`, for messages.
    pub fn describe_exit(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "killed by signal".to_string(),
        }
    }
}

fn tail(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(TAIL_BYTES);
    String::from_utf8_lossy(&bytes[start..]).trim().to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn captures_output_and_exit_code() {
        let out = ProcessSpec::new("sh")
            .args(["-c", "printf out; printf err >&2; exit 3"])
            .run()
            .await
            .unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout_tail(), "out");
        assert_eq!(out.stderr_tail(), "err");
        assert_eq!(out.describe_exit(), "exit code 3");
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let err = ProcessSpec::new("/definitely/not/here/printer")
            .run()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn dropping_the_future_stops_waiting() {
        let spec = ProcessSpec::new("sh").args(["-c", "sleep 5"]);
        let res = tokio::time::timeout(Duration::from_millis(100), spec.run()).await;
        assert!(res.is_err());
    }

    #[test]
    fn tail_keeps_the_end() {
        let long = "x".repeat(2000) + "END";
        let t = tail(long.as_bytes());
        assert!(t.ends_with("END"));
        assert_eq!(t.len(), TAIL_BYTES);
    }
}
