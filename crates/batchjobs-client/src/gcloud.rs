//! Thin wrapper around the `gcloud` CLI

use batchjobs_core::{BatchError, BatchResult};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Runs `gcloud` subcommands and returns their trimmed stdout
#[derive(Debug, Clone)]
pub struct Gcloud {
    program: PathBuf,
}

impl Gcloud {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run `gcloud <args>`; empty output counts as failure
    pub async fn run(&self, args: &[&str]) -> BatchResult<String> {
        debug!(program = %self.program.display(), args = ?args, "Running gcloud");

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                BatchError::Auth(format!(
                    "failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BatchError::Auth(format!(
                "{} {} exited with {}: {}",
                self.program.display(),
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            return Err(BatchError::Auth(format!(
                "{} {} printed nothing",
                self.program.display(),
                args.join(" ")
            )));
        }
        Ok(stdout)
    }
}

impl Default for Gcloud {
    fn default() -> Self {
        Self::new("gcloud")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_auth_error() {
        let gcloud = Gcloud::new("/nonexistent/gcloud");
        let err = gcloud.run(&["auth", "print-access-token"]).await.unwrap_err();
        assert!(matches!(err, BatchError::Auth(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_is_trimmed() {
        // `echo` stands in for gcloud: it prints its arguments
        let gcloud = Gcloud::new("echo");
        let out = gcloud.run(&["my-project"]).await.unwrap();
        assert_eq!(out, "my-project");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_output_is_error() {
        let gcloud = Gcloud::new("true");
        assert!(gcloud.run(&[]).await.is_err());
    }
}
