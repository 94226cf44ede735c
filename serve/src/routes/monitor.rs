//! `POST /monitor` (base spec §6): registers a run for SSE mirroring. Requires an
//! `Authorization: Bearer <admin api key>` header matching the configured admin key;
//! 404s if the run is unknown to storage.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app::AppState;

#[derive(Deserialize)]
pub struct MonitorRequest {
    pub run_id: String,
}

#[derive(Serialize)]
struct MonitorResponse {
    status: &'static str,
    run_id: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

pub async fn handle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<MonitorRequest>,
) -> impl IntoResponse {
    let provided = bearer_token(&headers);
    let expected = state.admin_api_key.as_ref().map(|k| k.expose());
    match (expected, provided) {
        (Some(expected), Some(provided)) if expected == provided => {}
        _ => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "missing or invalid Authorization header"})),
            )
                .into_response();
        }
    }

    match state.storage.get_run_status(&req.run_id).await {
        Ok(_) => (
            StatusCode::OK,
            Json(MonitorResponse {
                status: "monitoring_registered",
                run_id: req.run_id,
            }),
        )
            .into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("run not found: {}", req.run_id)})),
        )
            .into_response(),
    }
}
