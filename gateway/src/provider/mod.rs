//! Provider Clients (base spec §4.2) and the Provider Selector & Arbiter (base spec
//! §4.8). One `ProviderClient` per upstream family, all speaking the same
//! OpenAI-compatible chat/completions streaming contract; a prefix-based arbiter
//! resolves a unified model id to the right client instance, LRU-cached per
//! `(base_url, api_key)`.

pub mod arbiter;
pub mod http_client;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::ApiKey;
use crate::error::GatewayError;
use crate::storage::ChatMessage;

/// One streamed delta from an upstream provider. `content` is the plain-text token
/// (possibly containing `<think>` tags, per base spec §4.3); `reasoning_content` is a
/// provider-native reasoning field that bypasses the tag parser.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProviderDelta {
    pub content: Option<String>,
    pub reasoning_content: Option<String>,
    pub is_final: bool,
    pub usage: Option<ProviderUsage>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProviderUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A request to an upstream provider (base spec §4.2: "request with `{model, messages,
/// stream:true, temperature, top_p?, max_tokens?}`").
#[derive(Clone, Debug)]
pub struct ProviderRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// A thin wrapper around one upstream OpenAI-compatible chat/completions streaming
/// endpoint.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Opens a streaming request and returns a stream of deltas. A `[DONE]` sentinel on
    /// the wire terminates the stream (not itself yielded as an item).
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<BoxStream<'static, Result<ProviderDelta, GatewayError>>, GatewayError>;
}

/// Resolves a unified model id to `(provider-specific model id, client)`. Implemented
/// by [`arbiter::ProviderArbiter`]; kept as a trait so the orchestrator's tests can
/// substitute a resolver backed by a scripted [`ProviderClient`] instead of a real
/// HTTP-speaking one.
pub trait ProviderResolver: Send + Sync {
    fn resolve(
        &self,
        model_id: &str,
        request_api_key: Option<&ApiKey>,
    ) -> Result<(String, std::sync::Arc<dyn ProviderClient>), GatewayError>;
}

/// Identifies a provider by the fixed prefix table in base spec §6.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Hyperbolic,
    TogetherAi,
    DeepSeekAi,
    Azure,
    Google,
    Groq,
    Local,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Hyperbolic => "hyperbolic",
            ProviderKind::TogetherAi => "together-ai",
            ProviderKind::DeepSeekAi => "deepseek-ai",
            ProviderKind::Azure => "azure",
            ProviderKind::Google => "google",
            ProviderKind::Groq => "groq",
            ProviderKind::Local => "local",
        }
    }

    /// Resolves a unified model id to its provider by prefix (base spec §6).
    pub fn from_model_id(model_id: &str) -> Option<Self> {
        if let Some(_rest) = model_id.strip_prefix("hyperbolic/") {
            return Some(ProviderKind::Hyperbolic);
        }
        if let Some(_rest) = model_id.strip_prefix("together-ai/") {
            return Some(ProviderKind::TogetherAi);
        }
        if let Some(_rest) = model_id.strip_prefix("deepseek-ai/") {
            return Some(ProviderKind::DeepSeekAi);
        }
        if let Some(_rest) = model_id.strip_prefix("azure/") {
            return Some(ProviderKind::Azure);
        }
        if let Some(_rest) = model_id.strip_prefix("google/") {
            return Some(ProviderKind::Google);
        }
        if model_id.starts_with("groq") {
            return Some(ProviderKind::Groq);
        }
        if model_id.starts_with("local") {
            return Some(ProviderKind::Local);
        }
        None
    }
}

/// Key the arbiter's LRU cache is keyed on: a provider client instance is reusable for
/// any request sharing the same base URL and API key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClientCacheKey {
    pub base_url: String,
    pub api_key: String,
}

impl ClientCacheKey {
    pub fn new(base_url: &str, api_key: &ApiKey) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: api_key.expose().to_string(),
        }
    }
}
