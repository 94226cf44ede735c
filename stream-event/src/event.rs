//! Protocol-level event types: the wire shape of one stream chunk (type + payload).
//!
//! Mirrors the gateway's internal `Chunk` tagged union one-to-one; this crate has no
//! dependency on the gateway so the two can evolve independently and be tested in
//! isolation. `gateway::chunk` is the bridge that converts its own `Chunk` into
//! `ProtocolEvent` before envelope injection and SSE serialization.

use serde::Serialize;
use serde_json::Value;

/// Protocol event: wire shape for one stream chunk. Envelope (session_id aka run id,
/// node_id aka stream/re-entry id, event_id aka sequence number) is applied separately
/// via [`crate::envelope::EnvelopeState`].
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    /// Plain assistant text.
    Content { content: String },
    /// Text inside `<think>...</think>` or a provider's native reasoning field.
    Reasoning { content: String },
    /// One streamed line (or flushed buffer) of code-interpreter output.
    HotCode { content: String },
    /// Run lifecycle marker: `"started"` | `"complete"` | `"processing"`.
    Status { status: String, run_id: String },
    /// A terminal or recoverable error surfaced to the caller.
    Error { content: String },
    /// A parsed tool invocation. Never forwarded past the chunk filter to an SSE
    /// subscriber; kept here because the orchestrator still needs a wire shape for
    /// internal bookkeeping and tests.
    FunctionCall { name: String, arguments: Value },
}

impl ProtocolEvent {
    /// Serializes this event to a JSON object (type + payload only; no envelope).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// True for the one variant that must never reach an SSE subscriber.
    pub fn is_function_call(&self) -> bool {
        matches!(self, ProtocolEvent::FunctionCall { .. })
    }
}
