//! `POST /completions` (base spec §6): initiates a streaming run. Subscribes to the
//! in-process mirror channel before spawning the orchestrator, so no chunk the run
//! emits can be missed, then relays frames as SSE until the run finishes. Grounded on
//! the teacher-adjacent shape in `other_examples`'s `create_sse_stream_owned` (an
//! `async_stream`-built stream that owns the task producing its events).

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::Json;
use gateway::config::ApiKey;
use gateway::orchestrator::RunRequest;
use serde::Deserialize;

use crate::app::AppState;

#[derive(Deserialize)]
pub struct CompletionsRequest {
    /// Informational only; the model id's own prefix is authoritative for provider
    /// routing (base spec §6 provider-prefix table).
    #[serde(default)]
    pub provider: Option<String>,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub thread_id: String,
    /// Caller-side correlation id; the context builder reloads the full thread by
    /// `thread_id` regardless of which message triggered this run.
    #[serde(default)]
    pub message_id: Option<String>,
    pub run_id: String,
    pub assistant_id: String,
    #[serde(default)]
    pub stream_reasoning: bool,
}

pub async fn handle(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CompletionsRequest>,
) -> impl IntoResponse {
    let run_id = req.run_id.clone();
    tracing::info!(
        run_id = %run_id,
        model = %req.model,
        provider = ?req.provider,
        message_id = ?req.message_id,
        "completions run started"
    );

    let mut frames = state.mirror.subscribe(&run_id).await;

    let request = RunRequest {
        thread_id: req.thread_id,
        run_id: run_id.clone(),
        assistant_id: req.assistant_id,
        model: req.model,
        api_key: req.api_key.map(ApiKey::new),
        stream_reasoning: req.stream_reasoning,
    };

    let orchestrator = state.orchestrator.clone();
    let mirror = state.mirror.clone();
    let mut run_handle = tokio::spawn(async move { orchestrator.process_conversation(&request).await });

    let stream = async_stream::stream! {
        yield Ok::<_, Infallible>(Event::default().event("connected").data("{}"));

        loop {
            tokio::select! {
                frame = frames.recv() => {
                    match frame {
                        Ok(frame) => yield Ok(Event::default().event(frame.event_type).data(frame.payload)),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                result = &mut run_handle => {
                    if let Ok(Err(e)) = result {
                        yield Ok(Event::default().event("error").data(e.client_message()));
                    }
                    break;
                }
            }
        }
        mirror.forget(&run_id).await;
        yield Ok(Event::default().data("[DONE]"));
    };

    Sse::new(stream)
}
