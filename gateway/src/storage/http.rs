//! `StorageClient` implementation over the external Storage API's REST surface (base
//! spec §6). Only the operations the orchestrator actually calls are implemented.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Action, ActionStatus, Assistant, ChatMessage, Role, RunStatus, StorageClient, ToolSchema};
use crate::error::GatewayError;

pub struct HttpStorageClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStorageClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Deserialize)]
struct AssistantDto {
    id: String,
    name: String,
    model: String,
    instructions: String,
    tools: Vec<ToolSchemaDto>,
    #[serde(default)]
    vector_store_ids: Vec<String>,
}

#[derive(Deserialize)]
struct ToolSchemaDto {
    #[serde(rename = "function")]
    function: ToolFunctionDto,
}

#[derive(Deserialize)]
struct ToolFunctionDto {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    parameters: Value,
}

#[derive(Deserialize)]
struct MessageDto {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct RunStatusDto {
    status: RunStatus,
}

fn transport_err(e: reqwest::Error) -> GatewayError {
    GatewayError::Transport(e.to_string())
}

#[async_trait]
impl StorageClient for HttpStorageClient {
    async fn get_assistant(&self, assistant_id: &str) -> Result<Assistant, GatewayError> {
        let dto: AssistantDto = self
            .client
            .get(self.url(&format!("/assistants/{assistant_id}")))
            .send()
            .await
            .map_err(transport_err)?
            .json()
            .await
            .map_err(transport_err)?;
        Ok(Assistant {
            id: dto.id,
            name: dto.name,
            model: dto.model,
            instructions: dto.instructions,
            tools: dto
                .tools
                .into_iter()
                .map(|t| ToolSchema {
                    name: t.function.name,
                    description: t.function.description,
                    parameters: t.function.parameters,
                })
                .collect(),
            vector_store_ids: dto.vector_store_ids,
        })
    }

    async fn get_thread_messages(&self, thread_id: &str) -> Result<Vec<ChatMessage>, GatewayError> {
        let dtos: Vec<MessageDto> = self
            .client
            .get(self.url(&format!("/threads/{thread_id}/messages")))
            .send()
            .await
            .map_err(transport_err)?
            .json()
            .await
            .map_err(transport_err)?;
        Ok(dtos
            .into_iter()
            .map(|m| ChatMessage::new(Role::normalize(&m.role), m.content))
            .collect())
    }

    async fn append_assistant_message(
        &self,
        thread_id: &str,
        content: &str,
        is_last_chunk: bool,
    ) -> Result<(), GatewayError> {
        self.client
            .post(self.url("/messages/assistant"))
            .json(&json!({
                "thread_id": thread_id,
                "content": content,
                "is_last_chunk": is_last_chunk,
            }))
            .send()
            .await
            .map_err(transport_err)?;
        Ok(())
    }

    async fn append_tool_message(
        &self,
        thread_id: &str,
        content: &str,
        tool_id: &str,
    ) -> Result<(), GatewayError> {
        self.client
            .post(self.url("/messages"))
            .json(&json!({
                "thread_id": thread_id,
                "role": "tool",
                "content": content,
                "tool_id": tool_id,
            }))
            .send()
            .await
            .map_err(transport_err)?;
        Ok(())
    }

    async fn create_action(
        &self,
        run_id: &str,
        tool_name: &str,
        arguments: &serde_json::Map<String, Value>,
    ) -> Result<Action, GatewayError> {
        #[derive(Deserialize)]
        struct ActionDto {
            id: String,
        }
        let dto: ActionDto = self
            .client
            .post(self.url("/actions"))
            .json(&json!({
                "run_id": run_id,
                "tool_name": tool_name,
                "arguments": arguments,
            }))
            .send()
            .await
            .map_err(transport_err)?
            .json()
            .await
            .map_err(transport_err)?;
        Ok(Action {
            id: dto.id,
            run_id: run_id.to_string(),
            tool_name: tool_name.to_string(),
            arguments: arguments.clone(),
            status: ActionStatus::Pending,
        })
    }

    async fn update_action_status(
        &self,
        action_id: &str,
        status: ActionStatus,
    ) -> Result<(), GatewayError> {
        self.client
            .put(self.url(&format!("/actions/{action_id}/status")))
            .json(&json!({ "status": status }))
            .send()
            .await
            .map_err(transport_err)?;
        Ok(())
    }

    async fn get_run_status(&self, run_id: &str) -> Result<RunStatus, GatewayError> {
        let dto: RunStatusDto = self
            .client
            .get(self.url(&format!("/runs/{run_id}")))
            .send()
            .await
            .map_err(transport_err)?
            .json()
            .await
            .map_err(transport_err)?;
        Ok(dto.status)
    }

    async fn set_run_status(&self, run_id: &str, status: RunStatus) -> Result<(), GatewayError> {
        self.client
            .put(self.url(&format!("/runs/{run_id}/status")))
            .json(&json!({ "status": status }))
            .send()
            .await
            .map_err(transport_err)?;
        Ok(())
    }
}
