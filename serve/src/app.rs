//! Axum app: shared state and router (base spec §6 Event Router / C11).

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use gateway::config::ApiKey;
use gateway::mirror::RedisMirror;
use gateway::orchestrator::Orchestrator;
use gateway::storage::StorageClient;

use crate::routes::{completions, healthz, monitor, subscribe};

/// Shared handles every route needs: the orchestrator (which itself owns the provider
/// resolver and chunk sink), the mirror (both a `ChunkSink` and the subscribe route's
/// replay source), the storage client (for `/monitor`'s existence check), and the admin
/// key `/monitor` requires callers to present (base spec §6: "Requires API key").
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub mirror: Arc<RedisMirror>,
    pub storage: Arc<dyn StorageClient>,
    pub admin_api_key: Option<ApiKey>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/completions", post(completions::handle))
        .route("/monitor", post(monitor::handle))
        .route("/subscribe/:run_id", get(subscribe::handle))
        .route("/healthz", get(healthz::handle))
        .with_state(state)
}
