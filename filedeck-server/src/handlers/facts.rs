use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use filedeck_common::facts::FactKind;
use filedeck_common::record::FactResponse;

use super::error_response;
use crate::facts::FactError;
use crate::state::AppState;

impl IntoResponse for FactError {
    fn into_response(self) -> Response {
        error_response(StatusCode::BAD_GATEWAY, self.to_string(), "fact_fetch_failed")
    }
}

// ── GET /api/facts/{kind} ──

pub async fn get_fact(State(state): State<Arc<AppState>>, Path(kind): Path<String>) -> Response {
    let kind: FactKind = match kind.parse() {
        Ok(k) => k,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("{}", e), "invalid_fact_kind"),
    };
    let Some(fetcher) = &state.facts else {
        return error_response(StatusCode::NOT_FOUND, "Fact lookups are disabled", "facts_disabled");
    };

    match fetcher.fetch(kind).await {
        Ok(fact) => Json(FactResponse { kind, fact }).into_response(),
        Err(e) => e.into_response(),
    }
}
