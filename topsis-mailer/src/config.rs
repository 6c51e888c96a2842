//! Application configuration management.
//!
//! Configuration is loaded from an optional YAML file with environment variable overrides. The
//! configuration file path defaults to `config.yaml` but can be specified via `-f` flag or the
//! `TOPSIS_CONFIG` environment variable. A missing file is fine: every field has a default.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `TOPSIS_` override YAML values
//! 3. **`PORT`, `MAIL_ID`, `APP_PASSWORD`** - Plain variables kept for hosting platforms and `.env`
//!    files: `PORT` sets the listen port, `MAIL_ID` the sender address and SMTP login,
//!    `APP_PASSWORD` the SMTP password
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `TOPSIS_TOOL__PROGRAM=/opt/topsis/bin/topsis` sets the `tool.program` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use topsis_mailer::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Gmail account used to send results (an app password, not the account password)
//! MAIL_ID=ranker@gmail.com
//! APP_PASSWORD="abcd efgh ijkl mnop"
//!
//! # Kill the ranking tool if it runs for more than a minute
//! TOPSIS_TOOL__TIMEOUT=1m
//!
//! # Write mails to disk instead of sending them
//! TOPSIS_EMAIL__TYPE=file
//! TOPSIS_EMAIL__PATH=./emails
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "TOPSIS_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// Built once at startup and shared with the handlers through [`crate::AppState`]. All fields have
/// defaults (port 5000, `uploads/`, Gmail over STARTTLS).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Directory holding the per-request input and output artifacts
    pub upload_dir: PathBuf,
    /// External ranking tool invocation
    pub tool: ToolConfig,
    /// Outbound mail settings
    pub email: EmailConfig,
    /// Request size limits
    pub limits: LimitsConfig,
    /// Check weights, impacts and the recipient address before running the tool.
    /// When disabled, the tool's own error output is the only validation.
    pub validate_inputs: bool,
    /// CORS settings for browser clients served from another origin
    pub cors: CorsConfig,
    /// Export traces over OTLP (configured through the standard `OTEL_*` variables)
    pub enable_otel_export: bool,
    /// Sender address from the `MAIL_ID` environment variable, folded into `email` on load
    #[serde(skip_serializing)]
    pub mail_id: Option<String>,
    /// SMTP password from the `APP_PASSWORD` environment variable, folded into `email` on load
    #[serde(skip_serializing)]
    pub app_password: Option<String>,
}

/// External ranking tool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Executable name or path, invoked as `<program> <input> <weights> <impacts> <output>`
    pub program: String,
    /// Kill the tool and fail the request after this long (no limit when unset)
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

/// Email configuration for result delivery.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
// Note: Cannot use deny_unknown_fields here due to #[serde(flatten)] on transport
pub struct EmailConfig {
    /// Email transport method
    #[serde(flatten)]
    pub transport: EmailTransportConfig,
    /// Sender email address
    pub from_email: String,
    /// Sender display name
    pub from_name: String,
    /// Who to set the reply to field from
    pub reply_to: Option<String>,
    /// Subject line of the result mail
    pub subject: String,
}

/// Email transport configuration - either SMTP or file-based for testing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmailTransportConfig {
    /// Send emails via SMTP server
    Smtp {
        /// SMTP server hostname
        host: String,
        /// SMTP server port
        port: u16,
        /// SMTP authentication username (filled from `MAIL_ID` when unset)
        #[serde(default)]
        username: String,
        /// SMTP authentication password (filled from `APP_PASSWORD` when unset)
        #[serde(default, skip_serializing)]
        password: String,
        /// Use STARTTLS encryption
        use_tls: bool,
    },
    /// Write emails to files (for development/testing)
    File {
        /// Directory path where email files will be written
        path: String,
    },
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum accepted size of the uploaded file in bytes
    pub max_upload_bytes: u64,
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://topsis.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            upload_dir: PathBuf::from("uploads"),
            tool: ToolConfig::default(),
            email: EmailConfig::default(),
            limits: LimitsConfig::default(),
            validate_inputs: false,
            cors: CorsConfig::default(),
            enable_otel_export: false,
            mail_id: None,
            app_password: None,
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: "topsis".to_string(),
            timeout: None,
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: EmailTransportConfig::default(),
            from_email: String::new(),
            from_name: "Topsis Web Service".to_string(),
            reply_to: None,
            subject: "Your Topsis Result".to_string(),
        }
    }
}

impl Default for EmailTransportConfig {
    fn default() -> Self {
        Self::Smtp {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            use_tls: true,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            allow_credentials: false,
            max_age: None,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // MAIL_ID doubles as the sender address and the SMTP login, as with a Gmail app password
        if let Some(mail_id) = config.mail_id.take() {
            config.email.from_email = mail_id.clone();
            if let EmailTransportConfig::Smtp { username, .. } = &mut config.email.transport {
                *username = mail_id;
            }
        }

        if let Some(app_password) = config.app_password.take()
            && let EmailTransportConfig::Smtp { password, .. } = &mut config.email.transport
        {
            *password = app_password;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if let EmailTransportConfig::Smtp { username, password, .. } = &self.email.transport
            && (username.is_empty() || password.is_empty())
        {
            return Err(Error::Internal {
                operation: "Config validation: SMTP credentials are not configured. \
                     Please set the MAIL_ID and APP_PASSWORD environment variables, or use the file email transport."
                    .to_string(),
            });
        }

        if self.email.from_email.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: email.from_email is empty. Please set MAIL_ID or email.from_email.".to_string(),
            });
        }

        if self.tool.program.trim().is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: tool.program cannot be empty".to_string(),
            });
        }

        if self.tool.timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::Internal {
                operation: "Config validation: tool.timeout must be greater than zero".to_string(),
            });
        }

        if self.cors.allow_credentials && self.cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
            return Err(Error::Internal {
                operation: "Config validation: cors.allow_credentials cannot be combined with a '*' origin".to_string(),
            });
        }

        if self.limits.max_upload_bytes == 0 {
            return Err(Error::Internal {
                operation: "Config validation: limits.max_upload_bytes must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("TOPSIS_").ignore(&["config"]).split("__"))
            // Plain variables as set by hosting platforms and .env files
            .merge(Env::raw().only(&["PORT", "MAIL_ID", "APP_PASSWORD"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
