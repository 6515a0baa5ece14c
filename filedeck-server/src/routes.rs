use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use filedeck_common::record::MAX_UPLOAD_BYTES;

use crate::handlers::{blobs, facts, files, system, upload};
use crate::state::AppState;
use crate::store::HostedBlobs;

/// Request bodies above this are cut off by axum before the upload limit is checked.
const BODY_LIMIT_BYTES: usize = 4 * MAX_UPLOAD_BYTES as usize;

pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        // System
        .route("/api/health", get(system::health))
        // Uploads
        .route("/api/upload", post(upload::upload))
        // Files
        .route("/api/files", get(files::list_files))
        .route("/api/files", post(files::create_file))
        .route("/api/files", delete(files::delete_file))
        .route("/api/files/rename", post(files::rename_file))
        // Facts
        .route("/api/facts/{kind}", get(facts::get_fact))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES));

    let router = match &state.hosted {
        Some(HostedBlobs::Directory(path)) => api.nest_service("/blobs", ServeDir::new(path)),
        Some(HostedBlobs::Memory { .. }) => api.route("/blobs/{*path}", get(blobs::serve_blob)),
        None => api,
    };

    router
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .with_state(state)
}

/// CORS policy for the configured origins. No origins means same-origin only.
pub fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    if origins.iter().any(|o| o == "*") {
        return Ok(CorsLayer::permissive());
    }
    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o.trim_end_matches('/')))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_accepts_origins() {
        assert!(cors_layer(&[]).is_ok());
        assert!(cors_layer(&["*".to_string()]).is_ok());
        assert!(cors_layer(&["http://localhost:5173/".to_string()]).is_ok());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }
}
