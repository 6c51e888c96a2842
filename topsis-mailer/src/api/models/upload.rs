use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of every response from `POST /upload`, success or failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Multipart form accepted by `POST /upload`.
///
/// Only used for documentation; the handler reads the parts as a stream.
#[allow(dead_code)]
#[derive(Debug, ToSchema)]
pub struct UploadForm {
    /// Decision matrix as CSV
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// Comma-separated criterion weights, e.g. `1,1,2,1`
    pub weights: String,
    /// Comma-separated criterion impacts, e.g. `+,+,-,+`
    pub impacts: String,
    /// Address the ranked result is mailed to
    pub email: String,
}
