//! Platform Tool Handlers (base spec §4.5). A fixed routing table maps a platform
//! tool name to an in-process handler; each handler streams its own chunks back to the
//! caller, aggregates its output, and returns the text to submit as a tool message.
//! Grounded on `platform_tool_service.py`'s lazy-initialized handler dispatch
//! (`PlatformToolService.call_function`), reshaped around an async trait instead of a
//! class-level handler cache.

pub mod code_interpreter;
pub mod computer;
pub mod crawl_http;
pub mod sandbox_ws;
pub mod vector_http;
pub mod vector_store;
pub mod web_search;

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;

use crate::chunk::Chunk;
use crate::error::GatewayError;

/// One invocation of a platform tool, as parsed by the tool parser.
#[derive(Clone, Debug)]
pub struct PlatformToolRequest {
    pub thread_id: String,
    pub run_id: String,
    pub arguments: Map<String, Value>,
}

/// The result of running a platform tool: the text submitted to the thread as a `tool`
/// message, plus any chunks the handler wants re-emitted to the caller's SSE stream
/// while it runs (base spec §4.5: "Re-emit each as a `hot_code` / `output` chunk").
pub struct PlatformToolOutcome {
    pub tool_message: String,
    pub chunks: Vec<Chunk>,
}

#[async_trait]
pub trait PlatformToolHandler: Send + Sync {
    async fn handle(&self, request: PlatformToolRequest) -> Result<PlatformToolOutcome, GatewayError>;
}

/// The fixed tool-name → platform-handler routing table (base spec §3: "Tools with
/// names in the fixed set `{code_interpreter, web_search, vector_store_search,
/// computer}` are *platform tools*").
pub fn is_platform_tool(name: &str) -> bool {
    crate::storage::is_platform_tool(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_table_matches_storage_platform_set() {
        assert!(is_platform_tool("code_interpreter"));
        assert!(is_platform_tool("computer"));
        assert!(is_platform_tool("web_search"));
        assert!(is_platform_tool("vector_store_search"));
        assert!(!is_platform_tool("get_weather"));
    }
}
