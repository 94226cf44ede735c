//! In-memory fake `StorageClient`, grounded on the teacher's `NoOpUserMessageStore` /
//! mock-trait testing idiom (`serve/src/run/mod.rs`). Used by the gateway's own unit
//! tests and by `serve`'s integration tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{Action, ActionStatus, Assistant, ChatMessage, RunStatus, StorageClient};
use crate::error::GatewayError;

pub struct FakeStorageClient {
    assistants: Mutex<HashMap<String, Assistant>>,
    messages: Mutex<HashMap<String, Vec<ChatMessage>>>,
    run_status: Mutex<HashMap<String, RunStatus>>,
    actions: Mutex<HashMap<String, Action>>,
    next_action_id: Mutex<u64>,
}

impl FakeStorageClient {
    pub fn new() -> Self {
        Self {
            assistants: Mutex::new(HashMap::new()),
            messages: Mutex::new(HashMap::new()),
            run_status: Mutex::new(HashMap::new()),
            actions: Mutex::new(HashMap::new()),
            next_action_id: Mutex::new(0),
        }
    }

    pub fn with_assistant(self, assistant: Assistant) -> Self {
        self.assistants
            .lock()
            .unwrap()
            .insert(assistant.id.clone(), assistant);
        self
    }

    pub fn with_messages(self, thread_id: &str, messages: Vec<ChatMessage>) -> Self {
        self.messages
            .lock()
            .unwrap()
            .insert(thread_id.to_string(), messages);
        self
    }

    pub async fn set_run_status(&self, run_id: &str, status: RunStatus) {
        self.run_status
            .lock()
            .unwrap()
            .insert(run_id.to_string(), status);
    }

    pub fn messages_for(&self, thread_id: &str) -> Vec<ChatMessage> {
        self.messages
            .lock()
            .unwrap()
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().values().cloned().collect()
    }
}

impl Default for FakeStorageClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageClient for FakeStorageClient {
    async fn get_assistant(&self, assistant_id: &str) -> Result<Assistant, GatewayError> {
        self.assistants
            .lock()
            .unwrap()
            .get(assistant_id)
            .cloned()
            .ok_or_else(|| GatewayError::RunNotFound(assistant_id.to_string()))
    }

    async fn get_thread_messages(&self, thread_id: &str) -> Result<Vec<ChatMessage>, GatewayError> {
        Ok(self.messages_for(thread_id))
    }

    async fn append_assistant_message(
        &self,
        thread_id: &str,
        content: &str,
        is_last_chunk: bool,
    ) -> Result<(), GatewayError> {
        if !is_last_chunk {
            return Ok(());
        }
        self.messages
            .lock()
            .unwrap()
            .entry(thread_id.to_string())
            .or_default()
            .push(ChatMessage::new(super::Role::Assistant, content));
        Ok(())
    }

    async fn append_tool_message(
        &self,
        thread_id: &str,
        content: &str,
        _tool_id: &str,
    ) -> Result<(), GatewayError> {
        self.messages
            .lock()
            .unwrap()
            .entry(thread_id.to_string())
            .or_default()
            .push(ChatMessage::new(super::Role::Tool, content));
        Ok(())
    }

    async fn create_action(
        &self,
        run_id: &str,
        tool_name: &str,
        arguments: &serde_json::Map<String, Value>,
    ) -> Result<Action, GatewayError> {
        let mut next_id = self.next_action_id.lock().unwrap();
        *next_id += 1;
        let action = Action {
            id: format!("action-{next_id}"),
            run_id: run_id.to_string(),
            tool_name: tool_name.to_string(),
            arguments: arguments.clone(),
            status: ActionStatus::Pending,
        };
        self.actions
            .lock()
            .unwrap()
            .insert(action.id.clone(), action.clone());
        Ok(action)
    }

    async fn update_action_status(
        &self,
        action_id: &str,
        status: ActionStatus,
    ) -> Result<(), GatewayError> {
        if let Some(action) = self.actions.lock().unwrap().get_mut(action_id) {
            action.status = status;
        }
        Ok(())
    }

    async fn get_run_status(&self, run_id: &str) -> Result<RunStatus, GatewayError> {
        Ok(self
            .run_status
            .lock()
            .unwrap()
            .get(run_id)
            .copied()
            .unwrap_or(RunStatus::InProgress))
    }

    async fn set_run_status(&self, run_id: &str, status: RunStatus) -> Result<(), GatewayError> {
        self.run_status
            .lock()
            .unwrap()
            .insert(run_id.to_string(), status);
        Ok(())
    }
}
