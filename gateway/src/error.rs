//! Error taxonomy (base spec §7). Each variant carries enough context to log without
//! ever carrying a secret: API keys are wrapped in [`crate::config::ApiKey`], whose
//! `Display`/`Debug` impls always print `<redacted>`.

use thiserror::Error;

/// A top-level gateway error. Converted at the HTTP boundary into either an SSE
/// `error` frame (mid-stream) or a JSON 4xx body (pre-stream); the internal `Display`
/// text is safe to show to a caller in both cases.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Server Configuration Error: {0}")]
    Config(String),

    #[error("upstream provider error: {0}")]
    Transport(String),

    #[error("could not parse function-call response")]
    Parse,

    #[error("tool execution failed: {0}")]
    Tool(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("unsupported model id: {0}")]
    UnknownModel(String),

    #[error("run not found: {0}")]
    RunNotFound(String),
}

impl GatewayError {
    /// Text safe to send to the caller: identical to `Display` for every variant here,
    /// since none of them embed a secret. Kept as a distinct accessor so call sites
    /// that matter (HTTP responses, SSE error frames) are explicit about the intent,
    /// rather than relying on `Display` never changing.
    pub fn client_message(&self) -> String {
        self.to_string()
    }
}
