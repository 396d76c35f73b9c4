//! Runs external commands (package managers and git) and captures their
//! output.
use async_trait::async_trait;
use std::{path::Path, process::Stdio};
use tokio::process::Command;

#[cfg(test)]
use mockall::automock;

use crate::error::{Result, WatchError};

/// Captured result of an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    pub fn new(stdout: &str, stderr: &str, exit_code: Option<i32>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turn a non-zero exit that wrote to stderr into a
    /// [`WatchError::ProcessFailure`]. Non-zero exits with a silent stderr
    /// pass, `npm outdated` for example exits with 1 whenever it found
    /// something.
    pub fn into_result(self, command: &str) -> Result<Self> {
        if !self.success() && !self.stderr.trim().is_empty() {
            return Err(WatchError::ProcessFailure {
                command: command.to_string(),
                code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            });
        }
        Ok(self)
    }
}

/// Build an owned argument list.
pub fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` with `args` inside `working_dir` and wait for it.
    ///
    /// Never fails because of the exit code, only when the process could
    /// not be spawned at all.
    async fn run(
        &self,
        working_dir: &Path,
        command: &str,
        args: &[String],
    ) -> Result<ProcessOutput>;
}

/// Spawns real OS processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        working_dir: &Path,
        command: &str,
        args: &[String],
    ) -> Result<ProcessOutput> {
        let working_dir = if working_dir.as_os_str().is_empty() {
            Path::new("/")
        } else {
            working_dir
        };

        let output = Command::new(command)
            .args(args)
            .current_dir(working_dir)
            // git must fail instead of waiting for a password on a terminal
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output()
            .await?;

        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_zero_exit_with_stderr_is_a_failure() {
        let output = ProcessOutput::new("", "boom\n", Some(2));
        let err = output.into_result("mvn").unwrap_err();
        match err {
            WatchError::ProcessFailure {
                command,
                code,
                stderr,
            } => {
                assert_eq!(command, "mvn");
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_zero_exit_without_stderr_passes() {
        let output = ProcessOutput::new("{}", "", Some(1));
        assert!(output.into_result("npm").is_ok());
    }

    #[test]
    fn signalled_process_with_stderr_is_a_failure() {
        let output = ProcessOutput::new("", "killed", None);
        assert!(output.into_result("pip").is_err());
    }

    #[tokio::test]
    async fn system_runner_captures_output_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SystemRunner;

        let output = runner
            .run(dir.path(), "sh", &args(&["-c", "echo out; echo err >&2; exit 3"]))
            .await
            .unwrap();

        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.exit_code, Some(3));
    }

    #[tokio::test]
    async fn system_runner_fails_for_missing_binaries() {
        let runner = SystemRunner;
        let result = runner
            .run(Path::new("/"), "depwatch-definitely-missing-binary", &[])
            .await;
        assert!(result.is_err());
    }
}
