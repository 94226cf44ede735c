//! `code_interpreter` platform tool (base spec §4.5): opens a connection to the
//! sandbox endpoint, streams output back as `hot_code` chunks, aggregates stdout for
//! the tool message. Grounded on `code_execution_client.py` / `code_interpreter_handler.py`
//! (`normalize_code`, `execute_code`), adapted from a synchronous request/response call
//! into a streaming one per base spec §4.5's WebSocket framing.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::{PlatformToolHandler, PlatformToolOutcome, PlatformToolRequest};
use crate::chunk::Chunk;
use crate::error::GatewayError;

/// One message received over the sandbox code-execution connection.
#[derive(Clone, Debug, PartialEq)]
pub enum SandboxEvent {
    Output(String),
    Complete { uploaded_files: Vec<String> },
    Error(String),
}

/// Abstracts the sandbox transport so the handler's aggregation/chunking logic is
/// testable without a real WebSocket server.
#[async_trait]
pub trait SandboxClient: Send + Sync {
    async fn execute(
        &self,
        code: &str,
    ) -> Result<BoxStream<'static, Result<SandboxEvent, GatewayError>>, GatewayError>;
}

static CURLY_QUOTES: Lazy<Regex> = Lazy::new(|| Regex::new("[\u{201c}\u{201d}\u{2018}\u{2019}]").unwrap());
static NON_ASCII: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\x00-\x7F]+").unwrap());
static BARE_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.]+\s*\(.*\)\s*$").unwrap());

/// Normalizes inbound code the way `code_interpreter_handler.py`'s `normalize_code`
/// does: straighten curly quotes, collapse doubled backslashes, strip non-ASCII, and
/// auto-wrap a bare call expression in `print(...)` so its value is not silently lost.
pub fn normalize_code(code: &str) -> String {
    let mut out = CURLY_QUOTES
        .replace_all(code, |caps: &regex::Captures| match &caps[0] {
            "\u{201c}" | "\u{201d}" => "\"",
            _ => "'",
        })
        .into_owned();
    out = out.replace("\\\\", "\\");
    out = NON_ASCII.replace_all(&out, "").into_owned();

    let trimmed = out.trim();
    if BARE_CALL.is_match(trimmed) {
        out = format!("print({trimmed})");
    }
    out
}

pub struct CodeInterpreterHandler {
    client: Arc<dyn SandboxClient>,
}

impl CodeInterpreterHandler {
    pub fn new(client: Arc<dyn SandboxClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PlatformToolHandler for CodeInterpreterHandler {
    async fn handle(&self, request: PlatformToolRequest) -> Result<PlatformToolOutcome, GatewayError> {
        let code = request
            .arguments
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let normalized = normalize_code(code);

        let mut stream = self.client.execute(&normalized).await?;
        let mut chunks = vec![Chunk::HotCode(format!("```python\n{normalized}\n```\n"))];
        let mut stdout = String::new();
        let mut uploaded_files = Vec::new();
        let mut error: Option<String> = None;

        while let Some(event) = stream.next().await {
            match event? {
                SandboxEvent::Output(text) => {
                    chunks.push(Chunk::HotCode(text.clone()));
                    stdout.push_str(&text);
                }
                SandboxEvent::Complete { uploaded_files: files } => {
                    uploaded_files = files;
                }
                SandboxEvent::Error(message) => {
                    error = Some(message);
                }
            }
        }

        let tool_message = if let Some(message) = error {
            json!({"error": {"code": normalized, "message": message}}).to_string()
        } else {
            json!({
                "result": {
                    "code": normalized,
                    "output": stdout,
                    "uploaded_files": uploaded_files,
                }
            })
            .to_string()
        };

        Ok(PlatformToolOutcome { tool_message, chunks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::Map;

    struct FakeSandbox {
        events: Vec<SandboxEvent>,
    }

    #[async_trait]
    impl SandboxClient for FakeSandbox {
        async fn execute(
            &self,
            _code: &str,
        ) -> Result<BoxStream<'static, Result<SandboxEvent, GatewayError>>, GatewayError> {
            let events: Vec<_> = self.events.clone().into_iter().map(Ok).collect();
            Ok(Box::pin(stream::iter(events)))
        }
    }

    #[test]
    fn normalize_code_straightens_curly_quotes() {
        let out = normalize_code("print(\u{201c}hi\u{201d})");
        assert_eq!(out, "print(\"hi\")");
    }

    #[test]
    fn normalize_code_wraps_bare_expression_in_print() {
        let out = normalize_code("math.sqrt(4)");
        assert_eq!(out, "print(math.sqrt(4))");
    }

    #[test]
    fn normalize_code_does_not_wrap_statements() {
        let out = normalize_code("x = 1\nprint(x)");
        assert_eq!(out, "x = 1\nprint(x)");
    }

    #[tokio::test]
    async fn handle_aggregates_output_and_emits_hot_code_chunks() {
        let client = Arc::new(FakeSandbox {
            events: vec![
                SandboxEvent::Output("4\n".to_string()),
                SandboxEvent::Complete { uploaded_files: vec![] },
            ],
        });
        let handler = CodeInterpreterHandler::new(client);
        let mut args = Map::new();
        args.insert("code".to_string(), Value::String("print(2**2)".to_string()));
        let outcome = handler
            .handle(PlatformToolRequest {
                thread_id: "t1".to_string(),
                run_id: "r1".to_string(),
                arguments: args,
            })
            .await
            .unwrap();
        assert!(outcome.tool_message.contains("\"output\":\"4\\n\""));
        assert!(outcome.chunks.len() >= 2);
    }

    #[tokio::test]
    async fn handle_reports_sandbox_error_in_tool_message() {
        let client = Arc::new(FakeSandbox {
            events: vec![SandboxEvent::Error("division by zero".to_string())],
        });
        let handler = CodeInterpreterHandler::new(client);
        let mut args = Map::new();
        args.insert("code".to_string(), Value::String("1/0".to_string()));
        let outcome = handler
            .handle(PlatformToolRequest {
                thread_id: "t1".to_string(),
                run_id: "r1".to_string(),
                arguments: args,
            })
            .await
            .unwrap();
        assert!(outcome.tool_message.contains("division by zero"));
    }
}
