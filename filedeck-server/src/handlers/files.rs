use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use filedeck_common::record::{FileListResponse, FileView, RenameRequest, RenameResponse};

use super::error_response;
use super::upload::read_file_part;
use crate::service::FileError;
use crate::state::AppState;

// ── GET /api/files ──

pub async fn list_files(State(state): State<Arc<AppState>>) -> Result<Json<FileListResponse>, FileError> {
    let records = state.files.list().await?;
    let items: Vec<FileView> = records
        .into_iter()
        .map(|record| FileView {
            content_disposition: record.content_disposition(),
            preview: state.previews.preview(&record),
            url: record.url,
            pathname: record.pathname,
        })
        .collect();
    let total = items.len();
    Ok(Json(FileListResponse { items, total }))
}

// ── POST /api/files ──

pub async fn create_file(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, FileError> {
    let file = read_file_part(multipart).await?;
    let record = state.files.upload(file).await?;
    Ok(Json(record))
}

// ── POST /api/files/rename ──

pub async fn rename_file(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RenameRequest>,
) -> Result<Json<RenameResponse>, FileError> {
    let renamed = state.files.rename(&body.url, &body.name).await?;
    Ok(Json(RenameResponse {
        record: renamed.record,
        orphaned_url: renamed.orphaned_url,
    }))
}

// ── DELETE /api/files?url=… ──

#[derive(Deserialize)]
pub struct DeleteFileQuery {
    pub url: Option<String>,
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeleteFileQuery>,
) -> Response {
    let url = match query.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url,
        _ => return error_response(StatusCode::BAD_REQUEST, "Missing url parameter", "missing_url"),
    };
    match state.files.delete(url).await {
        Ok(()) => Json(serde_json::json!({ "ok": true })).into_response(),
        Err(e) => e.into_response(),
    }
}
