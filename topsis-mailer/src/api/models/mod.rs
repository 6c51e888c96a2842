//! API request and response data models.
//!
//! These structures define the public contract of the upload endpoint and are annotated with
//! `utoipa` so they appear in the generated OpenAPI document.
//!
//! - [`upload`]: The multipart upload form and the `{"message": ...}` response body

pub mod upload;

pub use upload::{MessageResponse, UploadForm};
