use std::sync::Arc;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use bytes::BytesMut;
use tracing::{debug, warn};

use filedeck_common::record::{UploadResponse, MAX_UPLOAD_BYTES};

use crate::service::{FileError, IncomingFile};
use crate::state::AppState;

/// Name of the multipart part carrying the upload.
pub const FILE_FIELD: &str = "file";

/// Pull the `file` part out of a multipart body.
///
/// Reading stops one chunk past the upload limit; the oversized payload is
/// handed on so the service can reject it. A body that is not multipart at
/// all counts as no file.
pub(crate) async fn read_file_part(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Option<IncomingFile>, FileError> {
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(e) => {
            debug!(error = %e, "Request is not multipart");
            return Ok(None);
        }
    };

    while let Some(mut field) = multipart.next_field().await.map_err(|e| multipart_fault(e, 0))? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();

        let mut buf = BytesMut::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_fault(e, buf.len() as u64))?
        {
            buf.extend_from_slice(&chunk);
            if buf.len() as u64 > MAX_UPLOAD_BYTES {
                debug!(file_name = %file_name, read = buf.len(), "Upload past limit, abandoning body");
                break;
            }
        }
        return Ok(Some(IncomingFile::new(file_name, buf.freeze())));
    }
    Ok(None)
}

fn multipart_fault(e: MultipartError, read: u64) -> FileError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return FileError::FileTooLarge { size: read.max(MAX_UPLOAD_BYTES + 1) };
    }
    warn!(error = %e, "Malformed multipart body");
    FileError::UploadFailed
}

// ── POST /api/upload ──

pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, FileError> {
    let file = read_file_part(multipart).await?;
    let record = state.files.upload(file).await?;
    Ok(Json(UploadResponse { url: record.url }))
}
