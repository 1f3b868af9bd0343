use crate::utils::errors::{CertSyncError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Exit status and captured output of a finished subprocess
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// `None` when the process was killed by a signal or timed out
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Last non-empty stderr line, falling back to stdout
    pub fn summary(&self) -> String {
        [&self.stderr, &self.stdout]
            .iter()
            .flat_map(|s| s.lines().rev())
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("")
            .to_string()
    }
}

/// Runs external programs; the only place subprocesses are spawned.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// `Err` only when the program could not be started at all
    async fn run(&self, program: &str, args: &[String]) -> Result<ProcessOutput>;
}

pub struct SystemProcessRunner {
    timeout: Duration,
}

impl SystemProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<ProcessOutput> {
        let exe = which::which(program).map_err(|_| {
            CertSyncError::Process(format!("{program} command not found in PATH"))
        })?;

        tracing::debug!("Executing: {} {}", exe.display(), args.join(" "));

        let child = Command::new(&exe)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => Ok(ProcessOutput {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }),
            Ok(Err(e)) => Err(CertSyncError::Process(format!(
                "Failed to execute {program}: {e}"
            ))),
            Err(_) => {
                tracing::warn!(
                    "{} did not finish within {}s, killed",
                    program,
                    self.timeout.as_secs()
                );
                Ok(ProcessOutput {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: format!("timed out after {}s", self.timeout.as_secs()),
                })
            }
        }
    }
}
