//! Invocation of the external command-line tools (openssl, open-pdf-sign).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error};

use crate::common::error::{AppError, AppResult};
use crate::common::utils::redact_args;

/// Result of one finished tool invocation
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Diagnostic text for error reports: stderr, or the exit code when stderr is empty
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        match self.exit_code {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs an external program to completion.
///
/// A non-zero exit is reported through `ToolOutput::success`, not as an
/// error; errors are reserved for spawn failures and timeouts.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &Path, args: &[String]) -> AppResult<ToolOutput>;

    /// Resolve a tool name to an executable path
    fn locate(&self, name: &str) -> AppResult<PathBuf> {
        locate_binary(name)
    }
}

pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &Path, args: &[String]) -> AppResult<ToolOutput> {
        let tool = program.display().to_string();
        debug!("Running {} {}", tool, redact_args(args));

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!("Failed to spawn {}: {}", tool, e);
                if e.kind() == std::io::ErrorKind::NotFound {
                    AppError::ToolNotAvailable(tool.clone())
                } else {
                    AppError::Io(e)
                }
            })?;

        // Dropping the timed-out future drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                error!("{} timed out after {}s", tool, self.timeout.as_secs());
                return Err(AppError::ToolTimeout {
                    tool,
                    secs: self.timeout.as_secs(),
                });
            }
        };

        Ok(ToolOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Find `name` on `PATH`, or accept it as-is when it already contains a path separator
pub fn locate_binary(name: &str) -> AppResult<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return if candidate.is_file() {
            Ok(candidate.to_path_buf())
        } else {
            Err(AppError::ToolNotAvailable(name.to_string()))
        };
    }

    let paths = std::env::var_os("PATH").ok_or_else(|| AppError::ToolNotAvailable(name.to_string()))?;
    for dir in std::env::split_paths(&paths) {
        for file_name in executable_names(name) {
            let full = dir.join(&file_name);
            if full.is_file() {
                return Ok(full);
            }
        }
    }

    Err(AppError::ToolNotAvailable(name.to_string()))
}

#[cfg(windows)]
fn executable_names(name: &str) -> Vec<String> {
    vec![name.to_string(), format!("{}.exe", name)]
}

#[cfg(not(windows))]
fn executable_names(name: &str) -> Vec<String> {
    vec![name.to_string()]
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_missing_binary() {
        let err = locate_binary("definitely-not-a-real-tool-7f3a").unwrap_err();
        assert!(matches!(err, AppError::ToolNotAvailable(name) if name == "definitely-not-a-real-tool-7f3a"));
    }

    #[test]
    fn test_locate_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("tool");
        std::fs::write(&tool, b"#!/bin/sh\n").unwrap();
        assert_eq!(locate_binary(tool.to_str().unwrap()).unwrap(), tool);
        assert!(locate_binary(dir.path().join("nope").to_str().unwrap()).is_err());
    }

    #[test]
    fn test_diagnostics_prefers_stderr() {
        let output = ToolOutput {
            success: false,
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "Mac verify error: invalid password?\n".to_string(),
        };
        assert_eq!(output.diagnostics(), "Mac verify error: invalid password?");

        let silent = ToolOutput {
            success: false,
            exit_code: Some(3),
            ..Default::default()
        };
        assert_eq!(silent.diagnostics(), "exited with status 3");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_reports_exit_status() {
        let runner = ProcessRunner::new(Duration::from_secs(10));
        let sh = locate_binary("sh").unwrap();

        let ok = runner.run(&sh, &["-c".to_string(), "echo hi".to_string()]).await.unwrap();
        assert!(ok.success);
        assert_eq!(ok.stdout.trim(), "hi");

        let failed = runner
            .run(&sh, &["-c".to_string(), "echo bad password >&2; exit 1".to_string()])
            .await
            .unwrap();
        assert!(!failed.success);
        assert_eq!(failed.diagnostics(), "bad password");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_times_out() {
        let runner = ProcessRunner::new(Duration::from_millis(200));
        let sh = locate_binary("sh").unwrap();
        let err = runner
            .run(&sh, &["-c".to_string(), "sleep 5".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ToolTimeout { .. }));
    }
}
