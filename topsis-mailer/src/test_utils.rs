//! Test utilities for handler and service tests.

use async_trait::async_trait;
use axum_test::TestServer;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::config::{Config, EmailConfig, EmailTransportConfig};
use crate::email::EmailService;
use crate::errors::{Error, Result};
use crate::ranking::{RankingJob, RankingTool, ToolOutcome};

/// Email config writing `.eml` files into `dir`
pub fn file_email_config(dir: &Path) -> EmailConfig {
    EmailConfig {
        transport: EmailTransportConfig::File {
            path: dir.to_string_lossy().into_owned(),
        },
        from_email: "ranker@example.com".to_string(),
        ..Default::default()
    }
}

/// Email config pointing at a closed local port, so every send fails
pub fn unreachable_smtp_config() -> EmailConfig {
    EmailConfig {
        transport: EmailTransportConfig::Smtp {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: "ranker@example.com".to_string(),
            password: "not-a-password".to_string(),
            use_tls: false,
        },
        from_email: "ranker@example.com".to_string(),
        ..Default::default()
    }
}

pub fn create_test_config(upload_dir: &Path, email: EmailConfig) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        upload_dir: upload_dir.to_path_buf(),
        email,
        ..Default::default()
    }
}

/// What [`FakeTool`] does when invoked.
#[derive(Debug, Clone)]
pub enum FakeBehavior {
    /// Write the given contents to the output path and exit 0
    Succeed(String),
    /// Exit with the code and stderr, writing nothing
    Fail(i32, String),
    /// Exit 0 without writing the output file
    NoOutput,
    /// Fail to run at all
    Unavailable(String),
}

/// In-process stand-in for the ranking CLI that records each invocation.
pub struct FakeTool {
    behavior: FakeBehavior,
    calls: Mutex<Vec<RecordedCall>>,
}

/// A snapshot of one invocation, including whether the input file existed at the time.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub job: RankingJob,
    pub input_contents: Option<Vec<u8>>,
}

impl FakeTool {
    pub fn new(behavior: FakeBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RankingTool for FakeTool {
    async fn rank(&self, job: &RankingJob) -> Result<ToolOutcome> {
        self.calls.lock().unwrap().push(RecordedCall {
            job: job.clone(),
            input_contents: std::fs::read(&job.input).ok(),
        });

        match &self.behavior {
            FakeBehavior::Succeed(contents) => {
                std::fs::write(&job.output, contents).unwrap();
                Ok(ToolOutcome::success())
            }
            FakeBehavior::Fail(code, stderr) => Ok(ToolOutcome::failure(*code, stderr.clone())),
            FakeBehavior::NoOutput => Ok(ToolOutcome::success()),
            FakeBehavior::Unavailable(reason) => Err(Error::Internal {
                operation: format!("run topsis: {reason}"),
            }),
        }
    }

    fn describe(&self, job: &RankingJob) -> String {
        format!("fake-topsis {}", job.input.display())
    }
}

/// Build a test server around the full router.
pub fn create_test_app(config: Config, tool: Arc<dyn RankingTool>) -> TestServer {
    let mailer = EmailService::new(&config.email).expect("Failed to create email service");
    let state = crate::AppState::builder().config(config).tool(tool).mailer(Arc::new(mailer)).build();
    let router = crate::build_router(state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}
