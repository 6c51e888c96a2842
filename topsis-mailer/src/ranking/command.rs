//! Subprocess implementation of [`RankingTool`].

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{RankingJob, RankingTool, ToolOutcome};
use crate::config::ToolConfig;
use crate::errors::{Error, Result};

/// Runs `<program> <input> <weights> <impacts> <output>` and waits for it to exit.
///
/// Output is captured, not streamed. Without a timeout the call waits as long as the program runs.
#[derive(Debug, Clone)]
pub struct CommandTool {
    program: String,
    timeout: Option<Duration>,
}

impl CommandTool {
    pub fn new(program: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl From<&ToolConfig> for CommandTool {
    fn from(config: &ToolConfig) -> Self {
        Self::new(config.program.clone(), config.timeout)
    }
}

#[async_trait]
impl RankingTool for CommandTool {
    #[instrument(skip_all, fields(program = %self.program))]
    async fn rank(&self, job: &RankingJob) -> Result<ToolOutcome> {
        let child = Command::new(&self.program)
            .arg(&job.input)
            .arg(&job.weights)
            .arg(&job.impacts)
            .arg(&job.output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Internal {
                operation: format!("run {}: {e}", self.program),
            })?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
                .await
                .map_err(|_| Error::ToolTimedOut { timeout })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| Error::Internal {
            operation: format!("wait for {}: {e}", self.program),
        })?;

        let outcome = ToolOutcome {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(
            exit_code = ?outcome.exit_code,
            stdout_len = outcome.stdout.len(),
            stderr_len = outcome.stderr.len(),
            "Ranking tool exited"
        );

        Ok(outcome)
    }

    fn describe(&self, job: &RankingJob) -> String {
        format!(
            "{} {} {} {} {}",
            self.program,
            job.input.display(),
            job.weights,
            job.impacts,
            job.output.display()
        )
    }
}
