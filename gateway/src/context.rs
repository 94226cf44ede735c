//! Context Builder (base spec §4.1). Loads assistant + conversation, composes the
//! system message (tool schema + instructions + timestamp), normalizes roles, and
//! applies sliding-window truncation. Grounded on `_set_up_context_window` in the
//! source this spec was distilled from.

use chrono::Local;
use serde_json::json;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::storage::{Assistant, ChatMessage, Role, StorageClient};
use crate::truncate::{truncate_messages, ApproxCharTokenCounter, TokenCounter};
use crate::truncate::{DEFAULT_MAX_CONTEXT_WINDOW, DEFAULT_THRESHOLD_PERCENTAGE};

/// Ready-to-send chat messages plus the resolved model id, for a single provider call.
pub struct RunContext {
    pub messages: Vec<ChatMessage>,
    pub model: String,
}

pub struct ContextBuilder {
    storage: Arc<dyn StorageClient>,
    counter: Arc<dyn TokenCounter>,
    truncate: bool,
}

impl ContextBuilder {
    pub fn new(storage: Arc<dyn StorageClient>) -> Self {
        Self {
            storage,
            counter: Arc::new(ApproxCharTokenCounter),
            truncate: true,
        }
    }

    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_truncation(mut self, enabled: bool) -> Self {
        self.truncate = enabled;
        self
    }

    /// Builds the provider-ready message list for one stream (base spec §4.1).
    pub async fn build(&self, assistant_id: &str, thread_id: &str) -> Result<RunContext, GatewayError> {
        let assistant = self.storage.get_assistant(assistant_id).await?;
        let history = self.storage.get_thread_messages(thread_id).await?;
        let mut messages = normalize_roles(history);

        let system_content = compose_system_message(&assistant);
        upsert_system_message(&mut messages, system_content);

        if self.truncate {
            messages = truncate_messages(
                &messages,
                self.counter.as_ref(),
                DEFAULT_MAX_CONTEXT_WINDOW,
                DEFAULT_THRESHOLD_PERCENTAGE,
            );
        }

        Ok(RunContext {
            messages,
            model: assistant.model,
        })
    }
}

/// `"tools:" + <json tool list> + "\n" + <instructions> + "\nToday's date and time:, "
/// + <local timestamp>` (verbatim composition from the source).
pub fn compose_system_message(assistant: &Assistant) -> String {
    let tools_json = json!(assistant
        .tools
        .iter()
        .map(|t| json!({
            "type": "function",
            "function": {
                "name": t.name,
                "description": t.description,
                "parameters": t.parameters,
            }
        }))
        .collect::<Vec<_>>());
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    format!(
        "tools:{}\n{}\nToday's date and time:, {}",
        tools_json, assistant.instructions, timestamp
    )
}

/// Lowercases every role; unknown roles become `user`. Trims content whitespace.
fn normalize_roles(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    messages
        .into_iter()
        .map(|m| ChatMessage {
            role: m.role,
            content: m.content.trim().to_string(),
        })
        .collect()
}

/// Replaces the first message's content if it is already a system message, otherwise
/// prepends a new one (base spec §4.1 step 2).
fn upsert_system_message(messages: &mut Vec<ChatMessage>, content: String) {
    if let Some(first) = messages.first_mut() {
        if first.role == Role::System {
            first.content = content;
            return;
        }
    }
    messages.insert(0, ChatMessage::new(Role::System, content));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ToolSchema;

    fn assistant() -> Assistant {
        Assistant {
            id: "asst-1".to_string(),
            name: "Helper".to_string(),
            model: "hyperbolic/llama-3.1-70b".to_string(),
            instructions: "Be concise.".to_string(),
            tools: vec![ToolSchema {
                name: "code_interpreter".to_string(),
                description: "run python".to_string(),
                parameters: json!({}),
            }],
            vector_store_ids: vec![],
        }
    }

    #[test]
    fn compose_system_message_contains_tools_and_instructions() {
        let msg = compose_system_message(&assistant());
        assert!(msg.starts_with("tools:"));
        assert!(msg.contains("code_interpreter"));
        assert!(msg.contains("Be concise."));
        assert!(msg.contains("Today's date and time:, "));
    }

    #[test]
    fn upsert_replaces_existing_system_message() {
        let mut messages = vec![
            ChatMessage::new(Role::System, "old"),
            ChatMessage::new(Role::User, "hi"),
        ];
        upsert_system_message(&mut messages, "new".to_string());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "new");
    }

    #[test]
    fn upsert_prepends_when_no_system_message() {
        let mut messages = vec![ChatMessage::new(Role::User, "hi")];
        upsert_system_message(&mut messages, "sys".to_string());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
    }
}
