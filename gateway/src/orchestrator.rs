//! Orchestrator (base spec §4.9): the top-level `process_conversation` / `stream_once`
//! loop tying together the context builder, provider arbiter, demultiplexer, tool
//! parser, platform tool handlers, and consumer gate. Implemented exactly as
//! pseudocoded in the base spec, as async methods on an `Orchestrator` holding
//! `Arc`-shared handles to its collaborators.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;

use crate::cancellation::{CancellationFlag, CancellationMonitor};
use crate::chunk::{filter_for_egress, Chunk};
use crate::config::ApiKey;
use crate::consumer_gate::{finalize_platform_action, gate_on_consumer_tool, GateOutcome};
use crate::context::ContextBuilder;
use crate::demux::{DemuxPhase, Demultiplexer};
use crate::error::GatewayError;
use crate::platform_tools::{is_platform_tool, PlatformToolHandler, PlatformToolRequest};
use crate::provider::{ProviderRequest, ProviderResolver};
use crate::storage::{ActionStatus, RunStatus, StorageClient};
use crate::tool_parser::parse_function_call;

pub const CANCELLATION_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const CONSUMER_GATE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Sink every chunk emitted for a run is pushed to: the SSE fan-out and the durable
/// Redis mirror both implement this (base spec §4.9/§4.10). Kept as a trait so the
/// orchestrator's unit tests can substitute an in-memory collector.
#[async_trait::async_trait]
pub trait ChunkSink: Send + Sync {
    async fn emit(&self, run_id: &str, chunk: Chunk);
}

/// A run's parsed, unsubmitted tool call (base spec §3 `FunctionCallState`).
#[derive(Clone, Debug)]
struct FunctionCallState {
    name: String,
    arguments: serde_json::Map<String, serde_json::Value>,
}

/// Identifies one conversation to continue (base spec §6 `POST /completions` body).
#[derive(Clone, Debug)]
pub struct RunRequest {
    pub thread_id: String,
    pub run_id: String,
    pub assistant_id: String,
    pub model: String,
    pub api_key: Option<ApiKey>,
    pub stream_reasoning: bool,
}

pub struct Orchestrator {
    storage: Arc<dyn StorageClient>,
    resolver: Arc<dyn ProviderResolver>,
    sink: Arc<dyn ChunkSink>,
    platform_handlers: HashMap<&'static str, Arc<dyn PlatformToolHandler>>,
    cancellation_poll_interval: Duration,
    consumer_gate_poll_interval: Duration,
}

impl Orchestrator {
    pub fn new(storage: Arc<dyn StorageClient>, resolver: Arc<dyn ProviderResolver>, sink: Arc<dyn ChunkSink>) -> Self {
        Self {
            storage,
            resolver,
            sink,
            platform_handlers: HashMap::new(),
            cancellation_poll_interval: CANCELLATION_POLL_INTERVAL,
            consumer_gate_poll_interval: CONSUMER_GATE_POLL_INTERVAL,
        }
    }

    pub fn with_platform_handler(mut self, name: &'static str, handler: Arc<dyn PlatformToolHandler>) -> Self {
        self.platform_handlers.insert(name, handler);
        self
    }

    pub fn with_poll_intervals(mut self, cancellation: Duration, consumer_gate: Duration) -> Self {
        self.cancellation_poll_interval = cancellation;
        self.consumer_gate_poll_interval = consumer_gate;
        self
    }

    /// `process_conversation` (base spec §4.9): streams once, then loops running
    /// whichever tool was parsed (platform handler or consumer gate) and re-streaming,
    /// until a stream ends with no pending function call.
    pub async fn process_conversation(&self, request: &RunRequest) -> Result<(), GatewayError> {
        let mut pending = self.stream_once(request).await?;

        while let Some(call) = pending {
            if self.storage.get_run_status(&request.run_id).await? == RunStatus::Cancelled {
                return Ok(());
            }

            if is_platform_tool(&call.name) {
                self.run_platform_tool(request, &call).await?;
            } else {
                let flag = CancellationFlag::new();
                let outcome = gate_on_consumer_tool(
                    self.storage.as_ref(),
                    &request.run_id,
                    &call.name,
                    &call.arguments,
                    &flag,
                    self.consumer_gate_poll_interval,
                )
                .await?;
                if outcome == GateOutcome::Cancelled {
                    return Ok(());
                }
            }

            pending = self.stream_once(request).await?;
        }

        Ok(())
    }

    async fn run_platform_tool(&self, request: &RunRequest, call: &FunctionCallState) -> Result<(), GatewayError> {
        let action = self
            .storage
            .create_action(&request.run_id, &call.name, &call.arguments)
            .await?;
        self.storage.set_run_status(&request.run_id, RunStatus::ActionRequired).await?;

        let handler = self
            .platform_handlers
            .get(call.name.as_str())
            .ok_or_else(|| GatewayError::Tool(format!("no handler registered for {}", call.name)))?
            .clone();

        let tool_request = PlatformToolRequest {
            thread_id: request.thread_id.clone(),
            run_id: request.run_id.clone(),
            arguments: call.arguments.clone(),
        };

        let result = handler.handle(tool_request).await;
        match result {
            Ok(outcome) => {
                for chunk in outcome.chunks {
                    self.sink.emit(&request.run_id, chunk).await;
                }
                self.storage
                    .append_tool_message(&request.thread_id, &outcome.tool_message, &action.id)
                    .await?;
                finalize_platform_action(self.storage.as_ref(), &action.id, true).await?;
                self.storage.set_run_status(&request.run_id, RunStatus::InProgress).await?;
                Ok(())
            }
            Err(e) => {
                finalize_platform_action(self.storage.as_ref(), &action.id, false).await?;
                self.storage
                    .append_tool_message(&request.thread_id, &e.client_message(), &action.id)
                    .await?;
                self.storage.set_run_status(&request.run_id, RunStatus::InProgress).await?;
                Ok(())
            }
        }
    }

    /// `stream_once` (base spec §4.9): one provider call from context build through
    /// stream completion. Returns the pending function call, if the model produced one.
    async fn stream_once(&self, request: &RunRequest) -> Result<Option<FunctionCallState>, GatewayError> {
        let monitor = CancellationMonitor::new();
        monitor.start(self.storage.clone(), request.run_id.clone(), self.cancellation_poll_interval);
        let cancellation = monitor.flag();

        let context = ContextBuilder::new(self.storage.clone())
            .build(&request.assistant_id, &request.thread_id)
            .await?;

        if cancellation.is_cancelled() {
            return Ok(None);
        }

        self.storage.set_run_status(&request.run_id, RunStatus::InProgress).await?;
        self.sink
            .emit(
                &request.run_id,
                Chunk::Status {
                    status: "started",
                    run_id: request.run_id.clone(),
                },
            )
            .await;

        let resolved = self.resolver.resolve(&request.model, request.api_key.as_ref());
        let (resolved_model, client) = match resolved {
            Ok(v) => v,
            Err(e) => return self.fail_run(request, None, e).await,
        };
        let provider_request = ProviderRequest {
            model: resolved_model,
            messages: context.messages,
            temperature: 0.7,
            top_p: None,
            max_tokens: None,
        };

        let mut stream = match client.stream(provider_request).await {
            Ok(s) => s,
            Err(e) => return self.fail_run(request, None, e).await,
        };
        let mut demux = Demultiplexer::new(request.stream_reasoning);
        let mut cancelled = false;

        while let Some(delta) = stream.next().await {
            if cancellation.is_cancelled() {
                cancelled = true;
                break;
            }
            let delta = match delta {
                Ok(d) => d,
                Err(e) => return self.fail_run(request, Some(demux.into_state().assistant_reply), e).await,
            };
            let mut chunks = Vec::new();
            if let Some(reasoning) = delta.reasoning_content.as_deref() {
                chunks.extend(demux.feed_reasoning_field(reasoning));
            }
            if let Some(content) = delta.content.as_deref() {
                chunks.extend(demux.feed(content));
            }
            for chunk in chunks {
                if filter_for_egress(&chunk) {
                    self.sink.emit(&request.run_id, chunk).await;
                }
            }
        }
        for chunk in demux.finish() {
            if filter_for_egress(&chunk) {
                self.sink.emit(&request.run_id, chunk).await;
            }
        }

        let state = demux.into_state();

        if cancelled {
            self.sink
                .emit(&request.run_id, Chunk::Error("Run cancelled".to_string()))
                .await;
            if !state.assistant_reply.is_empty() {
                self.storage
                    .append_assistant_message(&request.thread_id, &state.assistant_reply, true)
                    .await?;
            }
            self.storage.set_run_status(&request.run_id, RunStatus::Cancelled).await?;
            return Ok(None);
        }

        self.sink
            .emit(
                &request.run_id,
                Chunk::Status {
                    status: "complete",
                    run_id: request.run_id.clone(),
                },
            )
            .await;

        if !state.assistant_reply.is_empty() {
            self.storage
                .append_assistant_message(&request.thread_id, &state.assistant_reply, true)
                .await?;
        }

        if state.phase == DemuxPhase::Code {
            let mut arguments = serde_json::Map::new();
            arguments.insert("code".to_string(), serde_json::Value::String(state.code_collected));
            self.storage.set_run_status(&request.run_id, RunStatus::ActionRequired).await?;
            return Ok(Some(FunctionCallState {
                name: "code_interpreter".to_string(),
                arguments,
            }));
        }

        if let Some(parsed) = parse_function_call(&state.accumulated) {
            self.storage.set_run_status(&request.run_id, RunStatus::ActionRequired).await?;
            return Ok(Some(FunctionCallState {
                name: parsed.name,
                arguments: parsed.arguments,
            }));
        }

        self.storage.set_run_status(&request.run_id, RunStatus::Completed).await?;
        Ok(None)
    }

    /// Failure path for a resolver/config or upstream transport error (base spec §7):
    /// persists whatever assistant text had accumulated before the error, emits an
    /// `error` chunk, and moves the run to `failed` before propagating the error.
    async fn fail_run(
        &self,
        request: &RunRequest,
        partial_reply: Option<String>,
        error: GatewayError,
    ) -> Result<Option<FunctionCallState>, GatewayError> {
        self.sink
            .emit(&request.run_id, Chunk::Error(error.client_message()))
            .await;
        if let Some(reply) = partial_reply {
            if !reply.is_empty() {
                self.storage
                    .append_assistant_message(&request.thread_id, &reply, true)
                    .await?;
            }
        }
        self.storage.set_run_status(&request.run_id, RunStatus::Failed).await?;
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderClient, ProviderDelta};
    use crate::storage::fake::FakeStorageClient;
    use crate::storage::{Assistant, ChatMessage, Role, ToolSchema};
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};
    use serde_json::json;
    use tokio::sync::Mutex as AsyncMutex;

    struct CollectingSink {
        chunks: AsyncMutex<Vec<Chunk>>,
    }

    impl CollectingSink {
        fn new() -> Self {
            Self {
                chunks: AsyncMutex::new(Vec::new()),
            }
        }

        async fn contents(&self) -> Vec<String> {
            self.chunks
                .lock()
                .await
                .iter()
                .filter_map(|c| match c {
                    Chunk::Content(s) => Some(s.clone()),
                    _ => None,
                })
                .collect()
        }

        async fn statuses(&self) -> Vec<&'static str> {
            self.chunks
                .lock()
                .await
                .iter()
                .filter_map(|c| match c {
                    Chunk::Status { status, .. } => Some(*status),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl ChunkSink for CollectingSink {
        async fn emit(&self, _run_id: &str, chunk: Chunk) {
            self.chunks.lock().await.push(chunk);
        }
    }

    struct ScriptedProvider {
        deltas: Vec<ProviderDelta>,
    }

    #[async_trait]
    impl ProviderClient for ScriptedProvider {
        async fn stream(
            &self,
            _request: ProviderRequest,
        ) -> Result<BoxStream<'static, Result<ProviderDelta, GatewayError>>, GatewayError> {
            let deltas: Vec<_> = self.deltas.clone().into_iter().map(Ok).collect();
            Ok(Box::pin(stream::iter(deltas)))
        }
    }

    /// A resolver that always hands back the same scripted client, regardless of
    /// model id, so `stream_once` can be exercised without any real network stack.
    struct FakeResolver {
        client: Arc<dyn ProviderClient>,
    }

    impl ProviderResolver for FakeResolver {
        fn resolve(
            &self,
            model_id: &str,
            _request_api_key: Option<&ApiKey>,
        ) -> Result<(String, Arc<dyn ProviderClient>), GatewayError> {
            Ok((model_id.to_string(), self.client.clone()))
        }
    }

    /// A resolver that always fails, standing in for an unresolvable model id or a
    /// missing provider config.
    struct FailingResolver;

    impl ProviderResolver for FailingResolver {
        fn resolve(
            &self,
            model_id: &str,
            _request_api_key: Option<&ApiKey>,
        ) -> Result<(String, Arc<dyn ProviderClient>), GatewayError> {
            Err(GatewayError::UnknownModel(model_id.to_string()))
        }
    }

    /// A provider whose stream yields some content, then a transport error.
    struct ErroringProvider {
        ok_deltas: Vec<ProviderDelta>,
    }

    #[async_trait]
    impl ProviderClient for ErroringProvider {
        async fn stream(
            &self,
            _request: ProviderRequest,
        ) -> Result<BoxStream<'static, Result<ProviderDelta, GatewayError>>, GatewayError> {
            let mut items: Vec<Result<ProviderDelta, GatewayError>> =
                self.ok_deltas.clone().into_iter().map(Ok).collect();
            items.push(Err(GatewayError::Transport("connection reset".to_string())));
            Ok(Box::pin(stream::iter(items)))
        }
    }

    fn content_delta(text: &str) -> ProviderDelta {
        ProviderDelta {
            content: Some(text.to_string()),
            reasoning_content: None,
            is_final: false,
            usage: None,
        }
    }

    fn assistant() -> Assistant {
        Assistant {
            id: "asst-1".to_string(),
            name: "Helper".to_string(),
            model: "local/test-model".to_string(),
            instructions: "Be concise.".to_string(),
            tools: vec![ToolSchema {
                name: "get_weather".to_string(),
                description: "weather lookup".to_string(),
                parameters: json!({}),
            }],
            vector_store_ids: vec![],
        }
    }

    fn storage_with_assistant() -> Arc<FakeStorageClient> {
        let store = FakeStorageClient::new().with_assistant(assistant());
        store.with_messages("thread-1", vec![ChatMessage::new(Role::User, "Hi there")]);
        Arc::new(store)
    }

    fn orchestrator_with(
        storage: Arc<FakeStorageClient>,
        client: Arc<dyn ProviderClient>,
        sink: Arc<CollectingSink>,
    ) -> Orchestrator {
        Orchestrator::new(storage, Arc::new(FakeResolver { client }), sink)
            .with_poll_intervals(Duration::from_millis(5), Duration::from_millis(5))
    }

    fn run_request(run_id: &str) -> RunRequest {
        RunRequest {
            thread_id: "thread-1".to_string(),
            run_id: run_id.to_string(),
            assistant_id: "asst-1".to_string(),
            model: "local/test-model".to_string(),
            api_key: None,
            stream_reasoning: false,
        }
    }

    #[tokio::test]
    async fn plain_reply_completes_run_without_pending_tool_call() {
        let storage = storage_with_assistant();
        storage.set_run_status("run-1", RunStatus::Queued).await;
        let client: Arc<dyn ProviderClient> = Arc::new(ScriptedProvider {
            deltas: vec![content_delta("Hello"), content_delta(" world")],
        });
        let sink = Arc::new(CollectingSink::new());
        let orchestrator = orchestrator_with(storage.clone(), client, sink.clone());

        orchestrator.process_conversation(&run_request("run-1")).await.unwrap();

        assert_eq!(sink.contents().await, vec!["Hello", " world"]);
        assert_eq!(sink.statuses().await, vec!["started", "complete"]);
        assert_eq!(storage.get_run_status("run-1").await.unwrap(), RunStatus::Completed);
        let messages = storage.messages_for("thread-1");
        assert!(messages
            .iter()
            .any(|m| m.role == Role::Assistant && m.content == "Hello world"));
    }

    #[tokio::test]
    async fn function_call_reply_sets_action_required_and_filters_chunk() {
        let storage = storage_with_assistant();
        storage.set_run_status("run-4", RunStatus::Queued).await;
        let call_json = r#"{"name":"get_weather","arguments":{"city":"Paris"}}"#;
        let client: Arc<dyn ProviderClient> = Arc::new(ScriptedProvider {
            deltas: vec![content_delta(call_json)],
        });
        let sink = Arc::new(CollectingSink::new());
        let orchestrator = orchestrator_with(storage.clone(), client, sink.clone());

        let pending = orchestrator.stream_once(&run_request("run-4")).await.unwrap();
        let call = pending.expect("a valid function call should be parsed");
        assert_eq!(call.name, "get_weather");
        assert_eq!(storage.get_run_status("run-4").await.unwrap(), RunStatus::ActionRequired);
        // function_call chunks never reach the sink (base spec §4.10 chunk filter).
        assert!(sink.contents().await.is_empty());
    }

    #[tokio::test]
    async fn run_platform_tool_persists_output_and_resumes_run() {
        let storage = storage_with_assistant();
        storage.set_run_status("run-2", RunStatus::InProgress).await;

        struct EchoHandler;
        #[async_trait]
        impl PlatformToolHandler for EchoHandler {
            async fn handle(
                &self,
                request: PlatformToolRequest,
            ) -> Result<crate::platform_tools::PlatformToolOutcome, GatewayError> {
                Ok(crate::platform_tools::PlatformToolOutcome {
                    tool_message: format!("ran {:?}", request.arguments),
                    chunks: vec![Chunk::HotCode("1\n".to_string())],
                })
            }
        }

        let client: Arc<dyn ProviderClient> = Arc::new(ScriptedProvider { deltas: vec![] });
        let sink = Arc::new(CollectingSink::new());
        let orchestrator = orchestrator_with(storage.clone(), client, sink.clone())
            .with_platform_handler("code_interpreter", Arc::new(EchoHandler));

        let request = run_request("run-2");
        let call = FunctionCallState {
            name: "code_interpreter".to_string(),
            arguments: json!({"code": "print(1)"}).as_object().unwrap().clone(),
        };

        orchestrator.run_platform_tool(&request, &call).await.unwrap();

        let messages = storage.messages_for("thread-1");
        assert!(messages.iter().any(|m| m.role == Role::Tool && m.content.contains("ran")));
        assert_eq!(storage.get_run_status("run-2").await.unwrap(), RunStatus::InProgress);
        let actions = storage.actions();
        assert_eq!(actions[0].status, ActionStatus::Completed);
    }

    #[tokio::test]
    async fn run_platform_tool_marks_action_failed_on_handler_error() {
        let storage = storage_with_assistant();
        storage.set_run_status("run-3", RunStatus::InProgress).await;

        struct FailingHandler;
        #[async_trait]
        impl PlatformToolHandler for FailingHandler {
            async fn handle(
                &self,
                _request: PlatformToolRequest,
            ) -> Result<crate::platform_tools::PlatformToolOutcome, GatewayError> {
                Err(GatewayError::Tool("boom".to_string()))
            }
        }

        let client: Arc<dyn ProviderClient> = Arc::new(ScriptedProvider { deltas: vec![] });
        let sink = Arc::new(CollectingSink::new());
        let orchestrator = orchestrator_with(storage.clone(), client, sink)
            .with_platform_handler("code_interpreter", Arc::new(FailingHandler));

        let request = run_request("run-3");
        let call = FunctionCallState {
            name: "code_interpreter".to_string(),
            arguments: serde_json::Map::new(),
        };

        orchestrator.run_platform_tool(&request, &call).await.unwrap();

        let actions = storage.actions();
        assert_eq!(actions[0].status, ActionStatus::Failed);
        assert_eq!(storage.get_run_status("run-3").await.unwrap(), RunStatus::InProgress);
    }

    #[tokio::test]
    async fn cancelled_run_stops_mid_stream_and_persists_partial_reply() {
        let storage = storage_with_assistant();
        storage.set_run_status("run-5", RunStatus::Queued).await;

        // A provider stream that never completes on its own; cancellation must be the
        // only thing that ends it (base spec §4.8 boundary property). The loop only
        // re-checks cancellation when a new delta arrives, so the sender keeps feeding
        // items until the receiver side observes cancellation and drops it.
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Result<ProviderDelta, GatewayError>>();
        tx.send(Ok(content_delta("partial"))).unwrap();
        tokio::spawn({
            let tx = tx.clone();
            async move {
                for _ in 0..100 {
                    tokio::time::sleep(Duration::from_millis(3)).await;
                    if tx.send(Ok(content_delta(""))).is_err() {
                        break;
                    }
                }
            }
        });
        struct ChannelProvider {
            rx: AsyncMutex<Option<tokio::sync::mpsc::UnboundedReceiver<Result<ProviderDelta, GatewayError>>>>,
        }
        #[async_trait]
        impl ProviderClient for ChannelProvider {
            async fn stream(
                &self,
                _request: ProviderRequest,
            ) -> Result<BoxStream<'static, Result<ProviderDelta, GatewayError>>, GatewayError> {
                let rx = self.rx.lock().await.take().expect("single stream call in test");
                Ok(Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx)))
            }
        }
        let client: Arc<dyn ProviderClient> = Arc::new(ChannelProvider {
            rx: AsyncMutex::new(Some(rx)),
        });
        let sink = Arc::new(CollectingSink::new());
        let orchestrator = orchestrator_with(storage.clone(), client, sink.clone());

        let cancel_storage = storage.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(15)).await;
            cancel_storage.set_run_status("run-5", RunStatus::Cancelling).await;
        });

        let pending = orchestrator.stream_once(&run_request("run-5")).await.unwrap();
        assert!(pending.is_none());
        assert_eq!(storage.get_run_status("run-5").await.unwrap(), RunStatus::Cancelled);
        let messages = storage.messages_for("thread-1");
        assert!(messages.iter().any(|m| m.role == Role::Assistant && m.content == "partial"));
        drop(tx);
    }

    #[tokio::test]
    async fn code_interpreter_preamble_reconstructs_pending_call() {
        let storage = storage_with_assistant();
        storage.set_run_status("run-6", RunStatus::Queued).await;
        let client: Arc<dyn ProviderClient> = Arc::new(ScriptedProvider {
            deltas: vec![content_delta(
                r#"{"name":"code_interpreter","arguments":{"code":"print(1)\n"#,
            )],
        });
        let sink = Arc::new(CollectingSink::new());
        let orchestrator = orchestrator_with(storage.clone(), client, sink.clone());

        let pending = orchestrator.stream_once(&run_request("run-6")).await.unwrap();
        let call = pending.expect("an in-progress code_interpreter call should be reconstructed");
        assert_eq!(call.name, "code_interpreter");
        assert_eq!(call.arguments["code"], "print(1)\n");
        assert_eq!(storage.get_run_status("run-6").await.unwrap(), RunStatus::ActionRequired);
        // the raw preamble JSON never gets persisted as the assistant's reply.
        let messages = storage.messages_for("thread-1");
        assert!(!messages.iter().any(|m| m.role == Role::Assistant && m.content.contains("code_interpreter")));
    }

    #[tokio::test]
    async fn resolver_error_fails_run_and_emits_error_chunk() {
        let storage = storage_with_assistant();
        storage.set_run_status("run-7", RunStatus::Queued).await;
        let client: Arc<dyn ProviderClient> = Arc::new(ScriptedProvider { deltas: vec![] });
        let sink = Arc::new(CollectingSink::new());
        let orchestrator = Orchestrator::new(storage.clone(), Arc::new(FailingResolver), sink.clone())
            .with_poll_intervals(Duration::from_millis(5), Duration::from_millis(5));
        let _ = client;

        let result = orchestrator.stream_once(&run_request("run-7")).await;
        assert!(result.is_err());
        assert_eq!(storage.get_run_status("run-7").await.unwrap(), RunStatus::Failed);
        let chunks = sink.chunks.lock().await;
        assert!(chunks.iter().any(|c| matches!(c, Chunk::Error(_))));
    }

    #[tokio::test]
    async fn transport_error_mid_stream_fails_run_and_persists_partial_reply() {
        let storage = storage_with_assistant();
        storage.set_run_status("run-8", RunStatus::Queued).await;
        let client: Arc<dyn ProviderClient> = Arc::new(ErroringProvider {
            ok_deltas: vec![content_delta("partial answer")],
        });
        let sink = Arc::new(CollectingSink::new());
        let orchestrator = orchestrator_with(storage.clone(), client, sink.clone());

        let result = orchestrator.stream_once(&run_request("run-8")).await;
        assert!(result.is_err());
        assert_eq!(storage.get_run_status("run-8").await.unwrap(), RunStatus::Failed);
        let messages = storage.messages_for("thread-1");
        assert!(messages.iter().any(|m| m.role == Role::Assistant && m.content == "partial answer"));
        let chunks = sink.chunks.lock().await;
        assert!(chunks.iter().any(|c| matches!(c, Chunk::Error(_))));
    }
}
