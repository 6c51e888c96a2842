//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for the upload pipeline and the front-end assets
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - `POST /upload`: rank an uploaded decision matrix and mail the result
//! - `GET /api-docs/openapi.json`: OpenAPI document for the endpoint above
//! - `GET /`, `GET /{path}`: embedded front-end

pub mod handlers;
pub mod models;

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::upload::upload),
    components(schemas(models::MessageResponse, models::UploadForm)),
    tags((name = "upload", description = "Rank a decision matrix and mail the result"))
)]
pub struct ApiDoc;
