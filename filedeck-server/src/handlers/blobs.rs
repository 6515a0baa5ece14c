//! Serves objects of the in-memory store back under `/blobs`.
//!
//! The directory backend is served by `ServeDir` instead.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use filedeck_common::backend::encode_pathname;

use super::error_response;
use crate::state::AppState;
use crate::store::HostedBlobs;

// ── GET /blobs/{*path} ──

pub async fn serve_blob(State(state): State<Arc<AppState>>, Path(path): Path<String>) -> Response {
    let Some(HostedBlobs::Memory { base_url }) = &state.hosted else {
        return error_response(StatusCode::NOT_FOUND, "Blob not found", "not_found");
    };
    let url = format!("{}/{}", base_url.trim_end_matches('/'), encode_pathname(&path));

    match state.files.store().fetch(&url).await {
        Ok(content) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.essence_str().to_string())],
                content,
            )
                .into_response()
        }
        Err(e) => {
            debug!(url = %url, error = %e, "Blob lookup failed");
            error_response(StatusCode::NOT_FOUND, "Blob not found", "not_found")
        }
    }
}
