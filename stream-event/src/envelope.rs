//! Envelope (session_id, node_id, event_id) applied to every wire event.
//!
//! For the gateway: `session_id` is the run id (constant for the run's lifetime),
//! `node_id` is the current stream's id (`stream_once` is re-entered once per
//! tool round-trip, so this increments on each `status: "started"`), `event_id` is a
//! per-run monotonic sequence number used to detect gaps on the subscriber side.

use crate::event::ProtocolEvent;
use serde_json::Value;

/// Envelope fields attached to each wire event.
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    pub session_id: Option<String>,
    pub node_id: Option<String>,
    pub event_id: Option<u64>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn with_node_id(mut self, id: impl Into<String>) -> Self {
        self.node_id = Some(id.into());
        self
    }

    pub fn with_event_id(mut self, id: u64) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Merges envelope fields into the given JSON object (top-level only).
    /// Does not overwrite existing keys.
    pub fn inject_into(&self, obj: &mut Value) {
        let Some(obj) = obj.as_object_mut() else {
            return;
        };
        if let Some(ref id) = self.session_id {
            obj.entry("session_id")
                .or_insert_with(|| Value::String(id.clone()));
        }
        if let Some(ref id) = self.node_id {
            obj.entry("node_id")
                .or_insert_with(|| Value::String(id.clone()));
        }
        if let Some(id) = self.event_id {
            obj.entry("event_id")
                .or_insert_with(|| Value::Number(serde_json::Number::from(id)));
        }
    }
}

/// Envelope state for one run: run id, current stream (re-entry) id, next event id.
pub struct EnvelopeState {
    pub session_id: String,
    pub current_node_id: String,
    pub stream_seq: u64,
    pub next_event_id: u64,
}

impl EnvelopeState {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            current_node_id: String::new(),
            stream_seq: 0,
            next_event_id: 1,
        }
    }

    /// Injects envelope into the event value and advances state. On
    /// `type == "status"` with `status == "started"`, advances to a new stream id
    /// (one per `stream_once` re-entry).
    pub fn inject_into(&mut self, value: &mut Value) {
        if let Some("status") = value.get("type").and_then(|v| v.as_str()) {
            if value.get("status").and_then(|v| v.as_str()) == Some("started") {
                self.current_node_id = format!("stream-{}", self.stream_seq);
                self.stream_seq += 1;
            }
        }
        let node_id = if self.current_node_id.is_empty() {
            "stream-0"
        } else {
            self.current_node_id.as_str()
        };
        let env = Envelope::new()
            .with_session_id(&self.session_id)
            .with_node_id(node_id)
            .with_event_id(self.next_event_id);
        self.next_event_id += 1;
        env.inject_into(value);
    }
}

/// Converts a protocol event to JSON and injects envelope using the given state.
pub fn to_json(
    event: &ProtocolEvent,
    state: &mut EnvelopeState,
) -> Result<Value, serde_json::Error> {
    let mut value = event.to_value()?;
    state.inject_into(&mut value);
    Ok(value)
}
