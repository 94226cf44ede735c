//! The `Stream chunk` data type (base spec §3) and its bridge to the wire protocol.
//!
//! `Chunk` is the orchestration core's internal currency; `to_protocol_event` converts
//! it into `stream_event::ProtocolEvent` for envelope injection and SSE serialization,
//! mirroring the teacher's own `protocol::stream_event_to_protocol_format` bridge.

use serde_json::Value;
use stream_event::ProtocolEvent;

/// A single typed frame emitted by the stream demultiplexer (base spec §3, §4.10).
#[derive(Clone, Debug, PartialEq)]
pub enum Chunk {
    Content(String),
    Reasoning(String),
    HotCode(String),
    Status { status: &'static str, run_id: String },
    Error(String),
    /// Internal only: never forwarded past the chunk filter (§4.10).
    FunctionCall { name: String, arguments: Value },
}

impl Chunk {
    pub fn is_function_call(&self) -> bool {
        matches!(self, Chunk::FunctionCall { .. })
    }

    /// The SSE `event:` line value for this chunk (base spec §4.10), matching the
    /// `"type"` tag `to_protocol_event` serializes into the frame body.
    pub fn event_type(&self) -> &'static str {
        match self {
            Chunk::Content(_) => "content",
            Chunk::Reasoning(_) => "reasoning",
            Chunk::HotCode(_) => "hot_code",
            Chunk::Status { .. } => "status",
            Chunk::Error(_) => "error",
            Chunk::FunctionCall { .. } => "function_call",
        }
    }

    pub fn to_protocol_event(&self) -> ProtocolEvent {
        match self {
            Chunk::Content(s) => ProtocolEvent::Content { content: s.clone() },
            Chunk::Reasoning(s) => ProtocolEvent::Reasoning { content: s.clone() },
            Chunk::HotCode(s) => ProtocolEvent::HotCode { content: s.clone() },
            Chunk::Status { status, run_id } => ProtocolEvent::Status {
                status: status.to_string(),
                run_id: run_id.clone(),
            },
            Chunk::Error(s) => ProtocolEvent::Error { content: s.clone() },
            Chunk::FunctionCall { name, arguments } => ProtocolEvent::FunctionCall {
                name: name.clone(),
                arguments: Value::Object(arguments_to_map(arguments)),
            },
        }
    }
}

fn arguments_to_map(v: &Value) -> serde_json::Map<String, Value> {
    v.as_object().cloned().unwrap_or_default()
}

/// The chunk filter (§4.10): drops `function_call` chunks before they ever reach an
/// SSE subscriber or the Redis mirror. Implemented once, at the egress, per the base
/// spec's Design Notes.
pub fn filter_for_egress(chunk: &Chunk) -> bool {
    !chunk.is_function_call()
}

/// Serializes one protocol event (with envelope already injected) as an SSE frame:
/// `event: <type>\ndata: <json>\n\n`, per base spec §4.10/§6.
pub fn write_sse_frame(event_type: &str, value: &Value) -> String {
    let json = serde_json::to_string(value).expect("chunk serialization is infallible");
    format!("event: {event_type}\ndata: {json}\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_call_chunk_is_filtered() {
        let fc = Chunk::FunctionCall {
            name: "get_flight_times".to_string(),
            arguments: serde_json::json!({"departure": "LAX"}),
        };
        assert!(!filter_for_egress(&fc));
        assert!(filter_for_egress(&Chunk::Content("hi".to_string())));
    }

    #[test]
    fn sse_frame_has_event_and_data_lines() {
        let v = serde_json::json!({"type": "content", "content": "hi"});
        let frame = write_sse_frame("content", &v);
        assert!(frame.starts_with("event: content\ndata: "));
        assert!(frame.ends_with("\n\n"));
    }
}
