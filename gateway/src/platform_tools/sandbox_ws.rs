//! WebSocket-backed implementations of [`SandboxClient`](super::code_interpreter::SandboxClient)
//! and [`ShellTransport`](super::computer::ShellTransport), against the two sandbox
//! surfaces described in base spec §6: `ws://<sandbox>/ws/execute` for code execution,
//! `ws://<sandbox>/ws/computer?thread_id=...&user_id=system` for shell sessions.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::code_interpreter::{SandboxClient, SandboxEvent};
use super::computer::{ShellSession, ShellTransport};
use crate::error::GatewayError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn parse_frame(raw: &str) -> Result<SandboxEvent, GatewayError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| GatewayError::Parse(e.to_string()))?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Ok(SandboxEvent::Error(error.to_string()));
    }
    if value.get("status").and_then(Value::as_str) == Some("complete") {
        let uploaded_files = value
            .get("uploaded_files")
            .and_then(Value::as_array)
            .map(|files| {
                files
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        return Ok(SandboxEvent::Complete { uploaded_files });
    }
    let output = value.get("output").and_then(Value::as_str).unwrap_or_default();
    Ok(SandboxEvent::Output(output.to_string()))
}

/// Opens a fresh `ws://<sandbox>/ws/execute` connection per call; code execution is
/// request/response over the run's lifetime, not pooled (unlike the shell endpoint).
pub struct WsSandboxClient {
    endpoint: String,
}

impl WsSandboxClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }
}

#[async_trait]
impl SandboxClient for WsSandboxClient {
    async fn execute(
        &self,
        code: &str,
    ) -> Result<BoxStream<'static, Result<SandboxEvent, GatewayError>>, GatewayError> {
        let (socket, _) = connect_async(&self.endpoint)
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let (mut sink, stream) = socket.split();
        let request = json!({"code": code, "metadata": {}}).to_string();
        sink.send(Message::Text(request))
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let events = stream.filter_map(|frame| async move {
            match frame {
                Ok(Message::Text(text)) => Some(parse_frame(&text)),
                Ok(Message::Close(_)) => None,
                Ok(_) => None,
                Err(e) => Some(Err(GatewayError::Transport(e.to_string()))),
            }
        });
        Ok(Box::pin(events))
    }
}

/// One live `ws://<sandbox>/ws/computer` connection for a thread. Receives are
/// serialized through a lock held for the socket's lifetime (base spec §4.5.1).
pub struct WsShellSession {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<futures_util::stream::SplitStream<WsStream>>,
    closed: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl ShellSession for WsShellSession {
    async fn send_command(&self, command: &str) -> Result<(), GatewayError> {
        let frame = json!({"action": "shell_command", "command": command}).to_string();
        self.sink
            .lock()
            .await
            .send(Message::Text(frame))
            .await
            .map_err(|e| {
                self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
                GatewayError::Transport(e.to_string())
            })
    }

    async fn recv(&self) -> Option<super::computer::ShellMessage> {
        loop {
            match self.stream.lock().await.next().await {
                Some(Ok(Message::Text(text))) => {
                    let value: Value = serde_json::from_str(&text).ok()?;
                    if value.get("command_complete").and_then(Value::as_bool) == Some(true) {
                        return Some(super::computer::ShellMessage::CommandComplete);
                    }
                    if let Some(content) = value.get("content").and_then(Value::as_str) {
                        return Some(super::computer::ShellMessage::Output(content.to_string()));
                    }
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => {
                    self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
                    return None;
                }
                Some(Ok(_)) => continue,
                Some(Err(_)) => {
                    self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
                    return None;
                }
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(std::sync::atomic::Ordering::SeqCst)
    }
}

pub struct WsShellTransport {
    base_url: String,
}

impl WsShellTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

#[async_trait]
impl ShellTransport for WsShellTransport {
    async fn connect(&self, thread_id: &str) -> Result<std::sync::Arc<dyn ShellSession>, GatewayError> {
        let url = format!(
            "{}/ws/computer?thread_id={}&user_id=system",
            self.base_url.trim_end_matches('/'),
            thread_id
        );
        let (socket, _) = connect_async(&url)
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let (mut sink, stream) = socket.split();
        let join = json!({"action": "join_room", "room": thread_id}).to_string();
        sink.send(Message::Text(join))
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(std::sync::Arc::new(WsShellSession {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: std::sync::atomic::AtomicBool::new(false),
        }))
    }
}
