//! End-to-end SSE flow over a real HTTP listener: `POST /completions` against a
//! scripted provider, read back as Server-Sent Events. Requires a reachable Redis
//! instance (`REDIS_URL`, default `redis://127.0.0.1:6379`) since `AppState` mirrors
//! every chunk there; ignored by default like any test depending on live
//! infrastructure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use gateway::config::ApiKey;
use gateway::error::GatewayError;
use gateway::mirror::RedisMirror;
use gateway::orchestrator::{ChunkSink, Orchestrator};
use gateway::provider::{ProviderClient, ProviderDelta, ProviderRequest, ProviderResolver};
use gateway::storage::fake::FakeStorageClient;
use gateway::storage::{Assistant, ChatMessage, Role};
use tokio::net::TcpListener;

struct ScriptedProvider;

#[async_trait]
impl ProviderClient for ScriptedProvider {
    async fn stream(
        &self,
        _request: ProviderRequest,
    ) -> Result<BoxStream<'static, Result<ProviderDelta, GatewayError>>, GatewayError> {
        let deltas = vec![
            ProviderDelta {
                content: Some("Hello".to_string()),
                ..Default::default()
            },
            ProviderDelta {
                content: Some(" world".to_string()),
                is_final: true,
                ..Default::default()
            },
        ];
        Ok(Box::pin(stream::iter(deltas.into_iter().map(Ok))))
    }
}

struct ScriptedResolver {
    client: Arc<dyn ProviderClient>,
}

impl ProviderResolver for ScriptedResolver {
    fn resolve(
        &self,
        model_id: &str,
        _request_api_key: Option<&ApiKey>,
    ) -> Result<(String, Arc<dyn ProviderClient>), GatewayError> {
        Ok((model_id.to_string(), self.client.clone()))
    }
}

async fn redis_conn() -> redis::aio::ConnectionManager {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let client = redis::Client::open(url).expect("valid redis url");
    redis::aio::ConnectionManager::new(client)
        .await
        .expect("reachable redis instance")
}

#[tokio::test]
#[ignore = "requires a reachable Redis instance"]
async fn completions_streams_sse_frames_and_persists_reply() {
    let storage = Arc::new(
        FakeStorageClient::new()
            .with_assistant(Assistant {
                id: "asst-1".to_string(),
                name: "tester".to_string(),
                model: "hyperbolic/llama-3.1-70b".to_string(),
                instructions: "be terse".to_string(),
                tools: vec![],
                vector_store_ids: vec![],
            })
            .with_messages(
                "thread-1",
                vec![ChatMessage::new(Role::User, "hi there")],
            ),
    );
    let mirror = Arc::new(RedisMirror::new(redis_conn().await));
    let resolver = Arc::new(ScriptedResolver {
        client: Arc::new(ScriptedProvider),
    });
    let orchestrator = Arc::new(Orchestrator::new(
        storage.clone() as Arc<dyn gateway::storage::StorageClient>,
        resolver,
        mirror.clone() as Arc<dyn ChunkSink>,
    ));

    let state = Arc::new(serve::app::AppState {
        orchestrator,
        mirror,
        storage: storage as Arc<dyn gateway::storage::StorageClient>,
        admin_api_key: Some(ApiKey::new("sk-test")),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = serve::app::router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();
    let body = serde_json::json!({
        "provider": "hyperbolic",
        "model": "hyperbolic/llama-3.1-70b",
        "thread_id": "thread-1",
        "run_id": "run-1",
        "assistant_id": "asst-1",
    });
    let response = client
        .post(format!("http://{addr}/completions"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let raw = response.text().await.unwrap();
    assert!(raw.contains("event: connected"));
    assert!(raw.contains("Hello"));
    assert!(raw.contains(" world"));
    assert!(raw.contains("data: [DONE]"));

    assert_eq!(raw.matches("event: content").count(), 2);

    // Give the orchestrator's spawned task a moment to persist before checking.
    tokio::time::sleep(Duration::from_millis(50)).await;
}
