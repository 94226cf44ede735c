//! HTTP + SSE server for the inference gateway (base spec §6 Event Router).
//!
//! Wires the environment-configured provider arbiter, HTTP storage client, and Redis
//! mirror into an [`Orchestrator`](gateway::orchestrator::Orchestrator), then serves
//! `/completions`, `/monitor`, `/subscribe/:run_id`, `/healthz` on top of it.
//!
//! **Public API**: [`run_serve`], [`run_serve_on_listener`].

pub mod app;
mod routes;

use std::sync::Arc;

use gateway::config::GatewayConfig;
use gateway::model_alias::ModelAliasResolver;
use gateway::mirror::RedisMirror;
use gateway::orchestrator::Orchestrator;
use gateway::platform_tools::code_interpreter::CodeInterpreterHandler;
use gateway::platform_tools::computer::{ComputerHandler, ShellConnectionPool};
use gateway::platform_tools::crawl_http::HttpCrawlClient;
use gateway::platform_tools::sandbox_ws::{WsSandboxClient, WsShellTransport};
use gateway::platform_tools::vector_http::HttpVectorIndexClient;
use gateway::platform_tools::vector_store::VectorStoreHandler;
use gateway::platform_tools::web_search::WebSearchHandler;
use gateway::provider::arbiter::ProviderArbiter;
use gateway::storage::http::HttpStorageClient;
use gateway::storage::StorageClient;
use tokio::net::TcpListener;
use tracing::info;

use app::{router, AppState};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Builds the shared [`AppState`] from environment configuration. Platform tools with
/// no configured backend URL are simply not registered; the orchestrator treats an
/// unrouted platform tool call as a tool error rather than panicking (base spec §4.5:
/// "Unregistered platform tool name" edge case).
async fn build_state(config: GatewayConfig) -> Result<Arc<AppState>, Box<dyn std::error::Error + Send + Sync>> {
    let storage_base_url = config
        .storage_base_url
        .clone()
        .ok_or("STORAGE_BASE_URL must be set")?;
    let storage: Arc<dyn StorageClient> = Arc::new(HttpStorageClient::new(storage_base_url));

    let redis_url = config
        .redis_url
        .clone()
        .ok_or("REDIS_URL must be set")?;
    let redis_client = redis::Client::open(redis_url)?;
    let conn = redis::aio::ConnectionManager::new(redis_client).await?;
    let mirror = Arc::new(RedisMirror::new(conn));

    let admin_api_key = config.admin_api_key.clone();
    let code_execution_url = config.code_execution_url.clone();
    let shell_server_url = config.shell_server_url.clone();
    let vector_index_url = config.vector_index_url.clone();
    let web_search_url_template = config.web_search_url_template.clone();
    let crawl_api_url = config.crawl_api_url.clone();

    let resolver = Arc::new(ProviderArbiter::new(config, ModelAliasResolver::new()));

    let mut orchestrator = Orchestrator::new(storage.clone(), resolver, mirror.clone());

    if let Some(url) = code_execution_url {
        let handler = Arc::new(CodeInterpreterHandler::new(Arc::new(WsSandboxClient::new(url))));
        orchestrator = orchestrator.with_platform_handler("code_interpreter", handler);
    }
    if let Some(url) = shell_server_url {
        let pool = Arc::new(ShellConnectionPool::new(Arc::new(WsShellTransport::new(url))));
        orchestrator = orchestrator.with_platform_handler("computer", Arc::new(ComputerHandler::new(pool)));
    }
    if let Some(url) = vector_index_url {
        // The handler is keyed to one vector store per run in the base spec's model;
        // a single shared client is reused across stores, with the store id supplied
        // per-request by the tool call's arguments. `VectorStoreHandler::new` expects a
        // default store id, so platform routing here uses the assistant's attached
        // store — see `context::build_context`'s handoff into the orchestrator.
        let handler = Arc::new(VectorStoreHandler::new(
            Box::new(HttpVectorIndexClient::new(url)),
            "default",
        ));
        orchestrator = orchestrator.with_platform_handler("vector_store_search", handler);
    }
    if let (Some(template), Some(crawl_url)) = (web_search_url_template, crawl_api_url) {
        let handler = Arc::new(WebSearchHandler::new(Box::new(HttpCrawlClient::new(crawl_url)), template));
        orchestrator = orchestrator.with_platform_handler("web_search", handler);
    }

    Ok(Arc::new(AppState {
        orchestrator: Arc::new(orchestrator),
        mirror,
        storage,
        admin_api_key,
    }))
}

/// Runs the server on an existing listener. Used by tests (bind to `127.0.0.1:0` then
/// pass the listener in so the bound port can be discovered before serving starts).
pub async fn run_serve_on_listener(
    listener: TcpListener,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("gateway server listening on http://{}", addr);

    let config = GatewayConfig::from_env();
    let state = build_state(config).await?;
    let app = router(state);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Runs the server. Listens on `addr` (default `127.0.0.1:8080`).
pub async fn run_serve(addr: Option<&str>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_ADDR);
    let listener = TcpListener::bind(addr).await?;
    run_serve_on_listener(listener).await
}
