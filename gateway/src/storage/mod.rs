//! Storage API client (base spec §6: "consumed, not implemented"). The gateway owns no
//! persistent state; every read/write of a Thread, Message, Run, or Action goes through
//! this trait, grounded on the teacher's `UserMessageStore`/`NoOpUserMessageStore`
//! trait-object pattern so tests can substitute [`fake::FakeStorageClient`] for the real
//! HTTP-backed implementation in [`http::HttpStorageClient`].

pub mod fake;
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;

/// Base spec §3: role set a Message may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
    Platform,
}

impl Role {
    /// Normalizes a free-form role string: lowercases, maps anything unrecognized to
    /// `user` (base spec §4.1 step 4).
    pub fn normalize(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "assistant" => Role::Assistant,
            "system" => Role::System,
            "tool" => Role::Tool,
            "platform" => Role::Platform,
            _ => Role::User,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Base spec §3: `{type: "function", function: {name, description, parameters}}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The fixed set of tool names the gateway executes in-process (base spec §3, §4.5).
pub const PLATFORM_TOOL_NAMES: &[&str] =
    &["code_interpreter", "web_search", "vector_store_search", "computer"];

pub fn is_platform_tool(name: &str) -> bool {
    PLATFORM_TOOL_NAMES.contains(&name)
}

#[derive(Clone, Debug)]
pub struct Assistant {
    pub id: String,
    pub name: String,
    pub model: String,
    pub instructions: String,
    pub tools: Vec<ToolSchema>,
    pub vector_store_ids: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    ActionRequired,
    Completed,
    Cancelling,
    Cancelled,
    Failed,
    Expired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Clone, Debug)]
pub struct Action {
    pub id: String,
    pub run_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Map<String, Value>,
    pub status: ActionStatus,
}

/// Thin REST client over the external Storage API (base spec §6). Implementations
/// must be cheap to clone/share across concurrent runs (`Arc<dyn StorageClient>`).
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn get_assistant(&self, assistant_id: &str) -> Result<Assistant, GatewayError>;

    async fn get_thread_messages(&self, thread_id: &str) -> Result<Vec<ChatMessage>, GatewayError>;

    /// Appends an assistant-role message. Only the final chunk (`is_last_chunk=true`)
    /// actually persists a Message (base spec §3 invariant); intermediate calls may be
    /// used by implementations that stream partial text for monitoring purposes.
    async fn append_assistant_message(
        &self,
        thread_id: &str,
        content: &str,
        is_last_chunk: bool,
    ) -> Result<(), GatewayError>;

    async fn append_tool_message(
        &self,
        thread_id: &str,
        content: &str,
        tool_id: &str,
    ) -> Result<(), GatewayError>;

    async fn create_action(
        &self,
        run_id: &str,
        tool_name: &str,
        arguments: &serde_json::Map<String, Value>,
    ) -> Result<Action, GatewayError>;

    async fn update_action_status(
        &self,
        action_id: &str,
        status: ActionStatus,
    ) -> Result<(), GatewayError>;

    async fn get_run_status(&self, run_id: &str) -> Result<RunStatus, GatewayError>;

    async fn set_run_status(&self, run_id: &str, status: RunStatus) -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_normalize_maps_unknown_to_user() {
        assert_eq!(Role::normalize("ASSISTANT"), Role::Assistant);
        assert_eq!(Role::normalize("weird-role"), Role::User);
        assert_eq!(Role::normalize(""), Role::User);
    }

    #[test]
    fn platform_tool_names_are_fixed() {
        assert!(is_platform_tool("code_interpreter"));
        assert!(is_platform_tool("computer"));
        assert!(!is_platform_tool("get_flight_times"));
    }
}
