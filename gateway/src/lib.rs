//! Gateway: the multi-provider LLM inference core. Consumes a Storage API (base spec
//! §6) for Threads/Messages/Runs/Actions, owns no database itself, and exposes the
//! streaming orchestration loop (`orchestrator::Orchestrator`) that `serve` wires into
//! HTTP handlers.

pub mod cancellation;
pub mod chunk;
pub mod config;
pub mod consumer_gate;
pub mod context;
pub mod demux;
pub mod error;
pub mod mirror;
pub mod model_alias;
pub mod orchestrator;
pub mod platform_tools;
pub mod provider;
pub mod storage;
pub mod tool_parser;
pub mod truncate;

pub use error::GatewayError;
pub use orchestrator::{ChunkSink, Orchestrator, RunRequest};
