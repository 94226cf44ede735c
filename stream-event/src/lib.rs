//! Stream event protocol: type + payload + envelope.
//!
//! This crate defines the wire shape of a single stream chunk and envelope injection.
//! It has no dependency on the gateway crate; `gateway::chunk` bridges its internal
//! `Chunk` type into `ProtocolEvent` and calls `to_json`.

pub mod envelope;
pub mod event;

pub use envelope::{to_json, Envelope, EnvelopeState};
pub use event::ProtocolEvent;
