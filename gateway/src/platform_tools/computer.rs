//! `computer` platform tool (base spec §4.5, §4.5.1): a shell session over a pooled
//! WebSocket connection, one live connection per thread id, a receive lock serializing
//! concurrent commands, idle-timeout finalization. Grounded on
//! `StreamingCodeExecutionHandler`'s process/stream pairing in
//! `code_interpreter_handler.py`, generalized from a subprocess to the sandbox shell
//! WebSocket described in base spec §6 (`ws://<sandbox>/ws/computer?thread_id=...`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::{PlatformToolHandler, PlatformToolOutcome, PlatformToolRequest};
use crate::chunk::Chunk;
use crate::error::GatewayError;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(2);
pub const CONNECT_RETRIES: u32 = 3;
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// One message received from a shell session after sending a command.
#[derive(Clone, Debug, PartialEq)]
pub enum ShellMessage {
    Output(String),
    CommandComplete,
}

/// A single live connection to the sandbox shell endpoint for one thread.
#[async_trait]
pub trait ShellSession: Send + Sync {
    /// Sends `{action:"shell_command", command, thread_id}` and returns the next
    /// message, or `None` on idle timeout / closed socket.
    async fn send_command(&self, command: &str) -> Result<(), GatewayError>;

    /// Receives the next message, or `None` if the connection went idle/closed.
    async fn recv(&self) -> Option<ShellMessage>;

    fn is_closed(&self) -> bool;
}

/// Opens new shell sessions, retried per base spec §5 ("sandbox WebSocket connection
/// attempt retries 3× with 2 s delay").
#[async_trait]
pub trait ShellTransport: Send + Sync {
    async fn connect(&self, thread_id: &str) -> Result<Arc<dyn ShellSession>, GatewayError>;
}

async fn connect_with_retry(
    transport: &dyn ShellTransport,
    thread_id: &str,
) -> Result<Arc<dyn ShellSession>, GatewayError> {
    let mut last_err = None;
    for attempt in 0..CONNECT_RETRIES {
        match transport.connect(thread_id).await {
            Ok(session) => return Ok(session),
            Err(e) => {
                last_err = Some(e);
                if attempt + 1 < CONNECT_RETRIES {
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| GatewayError::Transport("shell connect failed".to_string())))
}

/// Holds at most one live session per thread id (base spec §4.5.1). A receive lock
/// serializes concurrent `execute` calls against the same thread's connection; a stale
/// (closed) session is evicted and rebuilt transparently.
pub struct ShellConnectionPool {
    transport: Arc<dyn ShellTransport>,
    sessions: Mutex<HashMap<String, Arc<dyn ShellSession>>>,
}

impl ShellConnectionPool {
    pub fn new(transport: Arc<dyn ShellTransport>) -> Self {
        Self {
            transport,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    async fn session_for(&self, thread_id: &str) -> Result<Arc<dyn ShellSession>, GatewayError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.get(thread_id) {
            if !existing.is_closed() {
                return Ok(existing.clone());
            }
            sessions.remove(thread_id);
        }
        let session = connect_with_retry(self.transport.as_ref(), thread_id).await?;
        sessions.insert(thread_id.to_string(), session.clone());
        Ok(session)
    }

    /// Releases a thread's pooled session (graceful close, base spec §4.5.1).
    pub async fn release(&self, thread_id: &str) {
        self.sessions.lock().await.remove(thread_id);
    }

    /// Runs one command to completion: sends it, then reads output until
    /// `CommandComplete` or an idle gap of `idle_timeout` elapses, returning the
    /// concatenated output (base spec §4.5: "after a configurable idle interval
    /// (default 2s) or an explicit command_complete signal, finalize").
    pub async fn run_command(
        &self,
        thread_id: &str,
        command: &str,
        idle_timeout: Duration,
    ) -> Result<(String, Vec<Chunk>), GatewayError> {
        let session = self.session_for(thread_id).await?;
        session.send_command(command).await?;

        let mut output = String::new();
        let mut chunks = Vec::new();
        loop {
            match timeout(idle_timeout, session.recv()).await {
                Ok(Some(ShellMessage::Output(text))) => {
                    chunks.push(Chunk::HotCode(text.clone()));
                    output.push_str(&text);
                }
                Ok(Some(ShellMessage::CommandComplete)) => break,
                Ok(None) => break,
                Err(_elapsed) => break,
            }
        }
        Ok((output, chunks))
    }
}

pub struct ComputerHandler {
    pool: Arc<ShellConnectionPool>,
    idle_timeout: Duration,
}

impl ComputerHandler {
    pub fn new(pool: Arc<ShellConnectionPool>) -> Self {
        Self {
            pool,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

#[async_trait]
impl PlatformToolHandler for ComputerHandler {
    async fn handle(&self, request: PlatformToolRequest) -> Result<PlatformToolOutcome, GatewayError> {
        let command = request
            .arguments
            .get("command")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| GatewayError::Tool("computer tool call is missing `command`".to_string()))?;

        let (output, chunks) = self
            .pool
            .run_command(&request.thread_id, command, self.idle_timeout)
            .await?;

        Ok(PlatformToolOutcome {
            tool_message: output,
            chunks,
        })
    }
}
