//! Generic OpenAI-compatible chat/completions streaming client (base spec §4.2).
//! Grounded on the SSE-consumption pattern (`reqwest` + `eventsource-stream`) used by
//! `austinjan-km/km-tools`'s `OpenAIProvider` — the one example crate in the corpus
//! that consumes upstream SSE rather than producing it.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ProviderClient, ProviderDelta, ProviderRequest, ProviderUsage};
use crate::config::ApiKey;
use crate::error::GatewayError;
use crate::storage::{ChatMessage, Role};

/// One OpenAI-compatible client instance, bound to a single `(base_url, api_key)` pair.
/// Constructed and cached by [`super::arbiter::ProviderArbiter`]; never mutated after
/// construction so it can be shared behind an `Arc` across concurrent runs.
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
}

impl OpenAiCompatibleClient {
    pub fn new(base_url: impl Into<String>, api_key: ApiKey) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    stream: bool,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
        Role::Tool => "tool",
        Role::Platform => "user",
    }
}

#[derive(Deserialize)]
struct WireChunk {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    delta: WireDelta,
}

#[derive(Deserialize, Default)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Some providers coalesce multiple JSON objects into a single SSE `data:` line
/// (`}{`, no separator). Splits on brace-depth-zero boundaries so a `}{` embedded
/// inside a string value is never mistaken for an object boundary.
fn split_coalesced_json_objects(data: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in data.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    objects.push(&data[start..=i]);
                    start = i + 1;
                }
            }
            _ => {}
        }
    }
    if objects.is_empty() {
        vec![data]
    } else {
        objects
    }
}

#[async_trait]
impl ProviderClient for OpenAiCompatibleClient {
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<BoxStream<'static, Result<ProviderDelta, GatewayError>>, GatewayError> {
        let wire = WireRequest {
            model: &request.model,
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: role_str(m.role),
                    content: m.content.clone(),
                })
                .collect(),
            stream: true,
            temperature: request.temperature,
            top_p: request.top_p,
            max_tokens: request.max_tokens,
        };

        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .bearer_auth(self.api_key.expose())
            .json(&wire)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(GatewayError::Transport(format!(
                "upstream returned status {status}"
            )));
        }

        let event_stream = response.bytes_stream().eventsource();
        let deltas = event_stream.flat_map(|event| {
            let parsed: Vec<Result<ProviderDelta, GatewayError>> = match event {
                Ok(ev) => {
                    if ev.data.trim() == "[DONE]" {
                        Vec::new()
                    } else {
                        split_coalesced_json_objects(&ev.data)
                            .into_iter()
                            .filter_map(parse_wire_chunk)
                            .collect()
                    }
                }
                Err(e) => vec![Err(GatewayError::Transport(e.to_string()))],
            };
            futures::stream::iter(parsed)
        });

        Ok(Box::pin(deltas))
    }
}

fn parse_wire_chunk(raw: &str) -> Option<Result<ProviderDelta, GatewayError>> {
    if raw.trim().is_empty() {
        return None;
    }
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => return Some(Err(GatewayError::Transport(format!("bad chunk json: {e}")))),
    };
    let chunk: WireChunk = match serde_json::from_value(value) {
        Ok(c) => c,
        Err(e) => return Some(Err(GatewayError::Transport(format!("bad chunk shape: {e}")))),
    };
    let delta = chunk.choices.into_iter().next().map(|c| c.delta).unwrap_or_default();
    Some(Ok(ProviderDelta {
        content: delta.content,
        reasoning_content: delta.reasoning_content,
        is_final: false,
        usage: chunk.usage.map(|u| ProviderUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_coalesced_objects_on_depth_zero_boundary() {
        let data = r#"{"a":1}{"b":2}"#;
        let parts = split_coalesced_json_objects(data);
        assert_eq!(parts, vec![r#"{"a":1}"#, r#"{"b":2}"#]);
    }

    #[test]
    fn does_not_split_brace_inside_string_value() {
        let data = r#"{"a":"}{"}"#;
        let parts = split_coalesced_json_objects(data);
        assert_eq!(parts, vec![data]);
    }

    #[test]
    fn single_object_passes_through() {
        let data = r#"{"choices":[{"delta":{"content":"hi"}}]}"#;
        let parts = split_coalesced_json_objects(data);
        assert_eq!(parts, vec![data]);
    }

    #[test]
    fn parse_wire_chunk_extracts_content_delta() {
        let raw = r#"{"choices":[{"delta":{"content":"hi"}}]}"#;
        let delta = parse_wire_chunk(raw).unwrap().unwrap();
        assert_eq!(delta.content.as_deref(), Some("hi"));
    }
}
