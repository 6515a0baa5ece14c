pub mod blobs;
pub mod facts;
pub mod files;
pub mod system;
pub mod upload;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use filedeck_common::record::ErrorBody;

use crate::service::FileError;

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>, code: &str) -> Response {
    let body = ErrorBody {
        error: message.into(),
        code: Some(code.to_string()),
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for FileError {
    fn into_response(self) -> Response {
        let status = match &self {
            FileError::NoFileProvided | FileError::FileTooLarge { .. } | FileError::InvalidName(_) => {
                StatusCode::BAD_REQUEST
            }
            FileError::SourceFetchFailed(_) => StatusCode::BAD_GATEWAY,
            FileError::UploadFailed
            | FileError::RenameFailed(_)
            | FileError::DeleteFailed(_)
            | FileError::ListFailed => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_response(status, self.to_string(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_error_status_codes() {
        let cases = [
            (FileError::NoFileProvided, StatusCode::BAD_REQUEST),
            (FileError::FileTooLarge { size: 1 }, StatusCode::BAD_REQUEST),
            (FileError::InvalidName("x".into()), StatusCode::BAD_REQUEST),
            (FileError::SourceFetchFailed("x".into()), StatusCode::BAD_GATEWAY),
            (FileError::UploadFailed, StatusCode::INTERNAL_SERVER_ERROR),
            (FileError::ListFailed, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
