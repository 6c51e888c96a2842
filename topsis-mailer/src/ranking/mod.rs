//! Ranking tool abstraction layer
//!
//! The actual TOPSIS computation lives in an external command-line program. This module defines
//! the [`RankingTool`] trait the upload handler talks to, and [`command::CommandTool`], the
//! implementation that runs the program as a subprocess.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ToolConfig;
use crate::errors::Result;

pub mod command;

pub use command::CommandTool;

/// Create the ranking tool from configuration
pub fn create_tool(config: &ToolConfig) -> Arc<dyn RankingTool> {
    Arc::new(CommandTool::from(config))
}

/// Arguments of one ranking run, in the order the tool expects them.
#[derive(Debug, Clone)]
pub struct RankingJob {
    /// CSV decision matrix to read
    pub input: PathBuf,
    /// Comma-separated weights, passed through untouched
    pub weights: String,
    /// Comma-separated impacts, passed through untouched
    pub impacts: String,
    /// Where the tool should write its result
    pub output: PathBuf,
}

/// What the tool reported once it exited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutcome {
    /// Exit code; `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutcome {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Default::default()
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A program that turns an input matrix into a ranked result file.
///
/// Implementations report a non-zero exit through [`ToolOutcome`]; `Err` is reserved for failures
/// to run the tool at all (spawn errors, timeouts).
#[async_trait]
pub trait RankingTool: Send + Sync {
    async fn rank(&self, job: &RankingJob) -> Result<ToolOutcome>;

    /// Human-readable command line for logs
    fn describe(&self, job: &RankingJob) -> String;
}
