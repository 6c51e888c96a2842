//! HTTP handlers for static asset serving.

use axum::{
    body::Body,
    extract::Path,
    http::{Response, StatusCode, header},
    response::IntoResponse,
};
use tracing::{debug, instrument};

use crate::static_assets;

/// `GET /`: the upload form
#[instrument]
pub async fn serve_index() -> impl IntoResponse {
    embedded_response("index.html")
}

/// `GET /{path}`: any other embedded asset, or 404
#[instrument]
pub async fn serve_asset(Path(path): Path<String>) -> impl IntoResponse {
    let path = if path.is_empty() || path.ends_with('/') {
        "index.html"
    } else {
        path.as_str()
    };
    embedded_response(path)
}

fn embedded_response(path: &str) -> Response<Body> {
    let Some(content) = static_assets::Assets::get(path) else {
        debug!("No embedded asset at {}", path);
        return StatusCode::NOT_FOUND.into_response();
    };

    let mime = mime_guess::from_path(path).first_or_octet_stream();
    (
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        content.data.into_owned(),
    )
        .into_response()
}
