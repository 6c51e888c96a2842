use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error as ThisError;

use crate::api::models::MessageResponse;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Multipart request had no `file` part at all
    #[error("No file uploaded")]
    NoFile,

    /// The file part was empty or one of the text fields was absent or blank
    #[error("Missing data fields")]
    MissingFields,

    /// Invalid request data (unparseable multipart, failed pre-validation)
    #[error("{message}")]
    BadRequest { message: String },

    /// Upload exceeded the configured size limit
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// The ranking tool exited with a non-zero status
    #[error("Topsis Error: {stderr}")]
    ToolFailed { stderr: String },

    /// The ranking tool ran past the configured timeout and was killed
    #[error("Topsis Error: timed out after {}", humantime::format_duration(*timeout))]
    ToolTimedOut { timeout: Duration },

    /// The ranking tool exited cleanly but left no result file behind
    #[error("Processing failed, output file not generated.")]
    MissingOutput,

    /// Ranking succeeded, but the result could not be mailed
    #[error("Processing done, but failed to send email.")]
    NotificationFailed,

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NoFile | Error::MissingFields | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::ToolFailed { .. }
            | Error::ToolTimedOut { .. }
            | Error::MissingOutput
            | Error::NotificationFailed
            | Error::Internal { .. }
            | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message returned to the caller.
    ///
    /// Unexpected failures are reported with their own text, as the front-end shows it verbatim.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Internal { .. } | Error::Other(_) | Error::ToolFailed { .. } | Error::ToolTimedOut { .. } | Error::MissingOutput => {
                tracing::error!("Processing error: {:#}", self);
            }
            Error::NotificationFailed => {
                tracing::warn!("Notification error: {}", self);
            }
            Error::NoFile | Error::MissingFields | Error::BadRequest { .. } | Error::PayloadTooLarge { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        (status, Json(MessageResponse::new(self.user_message()))).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
