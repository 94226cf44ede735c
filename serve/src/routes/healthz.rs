//! `GET /healthz`: liveness probe, no auth, no state access.

use axum::http::StatusCode;

pub async fn handle() -> StatusCode {
    StatusCode::OK
}
