//! # topsis-mailer: rank a decision matrix and mail the result
//!
//! `topsis-mailer` is a small web backend in front of the `topsis` command-line tool. A user
//! uploads a CSV decision matrix together with criterion weights, criterion impacts and an email
//! address; the service runs the tool on the upload and mails the ranked result file back.
//!
//! ## Request Flow
//!
//! A `POST /upload` request is handled in one pass by [`api::handlers::upload::upload`]:
//!
//! 1. The multipart form is read and checked for the `file`, `weights`, `impacts` and `email` fields.
//! 2. The file is written to `data_<uuid>.csv` in the upload directory.
//! 3. The tool is run as `topsis <input> <weights> <impacts> <output>` with output
//!    `result_<uuid>.csv`.
//! 4. The output file is attached to a mail sent over authenticated STARTTLS SMTP.
//! 5. Both files are deleted, whatever happened along the way (see [`artifacts`]).
//!
//! Concurrency comes from the HTTP server alone. Requests share nothing but the upload directory,
//! where each one works on its own UUID-named files.
//!
//! The upload form itself is compiled into the binary and served at `/`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use topsis_mailer::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = topsis_mailer::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     topsis_mailer::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod artifacts;
pub mod config;
pub mod email;
pub mod errors;
pub mod ranking;
mod static_assets;
pub mod telemetry;
pub mod types;
pub mod validation;

#[cfg(test)]
pub mod test_utils;

use crate::config::CorsOrigin;
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use email::EmailService;
use ranking::RankingTool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;

/// Headroom on top of the file size limit for the text fields and multipart framing
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across all request handlers.
///
/// - `config`: Application configuration, loaded once at startup
/// - `tool`: The ranking tool the upload handler runs
/// - `mailer`: Outbound mail for result delivery
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .tool(ranking::create_tool(&config.tool))
///     .mailer(Arc::new(EmailService::new(&config.email)?))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub tool: Arc<dyn RankingTool>,
    pub mailer: Arc<EmailService>,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allow_origin = if config.cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_credentials(config.cors.allow_credentials);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router.
///
/// - `POST /upload`: the upload pipeline, with a body limit derived from `limits.max_upload_bytes`
/// - `GET /api-docs/openapi.json`: OpenAPI document
/// - `GET /` and `GET /{path}`: embedded front-end assets
///
/// CORS and request tracing wrap every route.
///
/// # Errors
///
/// Returns an error if the CORS configuration is invalid.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors = create_cors_layer(&state.config)?;
    let body_limit = usize::try_from(state.config.limits.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let router = Router::new()
        .route(
            "/upload",
            post(api::handlers::upload::upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api-docs/openapi.json", get(|| async { Json(api::ApiDoc::openapi()) }))
        .route("/", get(api::handlers::static_assets::serve_index))
        .route("/{*path}", get(api::handlers::static_assets::serve_asset))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!(
            upload_dir = %config.upload_dir.display(),
            program = %config.tool.program,
            timeout = ?config.tool.timeout,
            validate_inputs = config.validate_inputs,
            "Starting topsis-mailer"
        );

        tokio::fs::create_dir_all(&config.upload_dir)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create upload directory {}: {}", config.upload_dir.display(), e))?;

        let mailer = EmailService::new(&config.email).map_err(|e| anyhow::anyhow!("Failed to create email service: {}", e))?;

        let state = AppState::builder()
            .config(config.clone())
            .tool(ranking::create_tool(&config.tool))
            .mailer(Arc::new(mailer))
            .build();

        let router = build_router(state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "topsis-mailer listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
