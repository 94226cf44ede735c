//! Provider Selector & Arbiter (base spec §4.2, §4.8). Resolves a unified model id to
//! a provider, then to a cached `ProviderClient` instance keyed by `(base_url,
//! api_key)`, bounded at ~16 entries with simple least-recently-used eviction (base
//! spec §5: "guarded by a reentrant lock; readers dominate").

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::http_client::OpenAiCompatibleClient;
use super::{ClientCacheKey, ProviderClient, ProviderKind, ProviderResolver};
use crate::config::{ApiKey, GatewayConfig};
use crate::error::GatewayError;
use crate::model_alias::ModelAliasResolver;

const CACHE_CAPACITY: usize = 16;

struct LruCache {
    entries: HashMap<ClientCacheKey, Arc<dyn ProviderClient>>,
    order: Vec<ClientCacheKey>,
}

impl LruCache {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn get_or_insert_with(
        &mut self,
        key: ClientCacheKey,
        build: impl FnOnce() -> Arc<dyn ProviderClient>,
    ) -> Arc<dyn ProviderClient> {
        if let Some(existing) = self.entries.get(&key).cloned() {
            self.touch(&key);
            return existing;
        }
        let client = build();
        if self.entries.len() >= CACHE_CAPACITY {
            if let Some(lru_key) = self.order.first().cloned() {
                self.entries.remove(&lru_key);
                self.order.retain(|k| k != &lru_key);
            }
        }
        self.entries.insert(key.clone(), client.clone());
        self.order.push(key);
        client
    }

    fn touch(&mut self, key: &ClientCacheKey) {
        self.order.retain(|k| k != key);
        self.order.push(key.clone());
    }
}

/// Resolves model ids to provider clients, caching instances for reuse. A
/// request-scoped API key (the caller supplies their own key) always builds a
/// transient, uncached client, so it never displaces the default configured client's
/// cache entry (base spec §4.2).
pub struct ProviderArbiter {
    config: GatewayConfig,
    aliases: ModelAliasResolver,
    cache: Mutex<LruCache>,
}

impl ProviderArbiter {
    pub fn new(config: GatewayConfig, aliases: ModelAliasResolver) -> Self {
        Self {
            config,
            aliases,
            cache: Mutex::new(LruCache::new()),
        }
    }

    /// Resolves `model_id` to `(provider-specific model id, client)`. `request_api_key`
    /// overrides the configured admin key for this call only.
    pub fn resolve(
        &self,
        model_id: &str,
        request_api_key: Option<&ApiKey>,
    ) -> Result<(String, Arc<dyn ProviderClient>), GatewayError> {
        let provider = ProviderKind::from_model_id(model_id)
            .ok_or_else(|| GatewayError::UnknownModel(model_id.to_string()))?;

        let base_url = self
            .config
            .base_url_for_provider(provider.name())
            .ok_or_else(|| {
                GatewayError::Config(format!(
                    "{} service endpoint is not configured.",
                    capitalize(provider.name())
                ))
            })?
            .to_string();

        let resolved_model = self.aliases.resolve(model_id).to_string();

        let api_key = match request_api_key {
            Some(k) => k.clone(),
            None => self
                .config
                .admin_api_key
                .clone()
                .ok_or_else(|| GatewayError::Config("no API key configured".to_string()))?,
        };

        if request_api_key.is_some() {
            let client: Arc<dyn ProviderClient> =
                Arc::new(OpenAiCompatibleClient::new(base_url, api_key));
            return Ok((resolved_model, client));
        }

        let key = ClientCacheKey::new(&base_url, &api_key);
        let client = self
            .cache
            .lock()
            .unwrap()
            .get_or_insert_with(key, || Arc::new(OpenAiCompatibleClient::new(base_url.clone(), api_key.clone())));
        Ok((resolved_model, client))
    }
}

impl ProviderResolver for ProviderArbiter {
    fn resolve(
        &self,
        model_id: &str,
        request_api_key: Option<&ApiKey>,
    ) -> Result<(String, Arc<dyn ProviderClient>), GatewayError> {
        ProviderArbiter::resolve(self, model_id, request_api_key)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_hyperbolic() -> GatewayConfig {
        GatewayConfig {
            base_url: None,
            admin_api_key: Some(ApiKey::new("sk-test")),
            hyperbolic_base_url: Some("https://hyperbolic.example".to_string()),
            together_base_url: None,
            deepseek_base_url: None,
            storage_base_url: None,
            redis_url: None,
            shell_server_url: None,
            code_execution_url: None,
            vector_index_url: None,
            web_search_url_template: None,
            crawl_api_url: None,
            signed_url_secret: None,
            event_queue_capacity: 128,
            append_queue_capacity: 64,
        }
    }

    #[test]
    fn unconfigured_provider_yields_config_error_without_leaking_key() {
        let arbiter = ProviderArbiter::new(config_with_hyperbolic(), ModelAliasResolver::new());
        let err = arbiter.resolve("together-ai/llama", None).unwrap_err();
        let msg = err.client_message();
        assert!(msg.contains("Together"));
        assert!(!msg.contains("sk-test"));
    }

    #[test]
    fn unknown_prefix_is_rejected_before_any_network_call() {
        let arbiter = ProviderArbiter::new(config_with_hyperbolic(), ModelAliasResolver::new());
        assert!(arbiter.resolve("banana/model", None).is_err());
    }

    #[test]
    fn same_config_resolves_to_cached_client_instance() {
        let arbiter = ProviderArbiter::new(config_with_hyperbolic(), ModelAliasResolver::new());
        let (_, first) = arbiter.resolve("hyperbolic/llama-3.1-70b", None).unwrap();
        let (_, second) = arbiter.resolve("hyperbolic/llama-3.1-8b", None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn request_scoped_api_key_does_not_touch_cache() {
        let arbiter = ProviderArbiter::new(config_with_hyperbolic(), ModelAliasResolver::new());
        let (_, cached) = arbiter.resolve("hyperbolic/llama-3.1-70b", None).unwrap();
        let transient_key = ApiKey::new("sk-transient");
        let (_, transient) = arbiter
            .resolve("hyperbolic/llama-3.1-70b", Some(&transient_key))
            .unwrap();
        assert!(!Arc::ptr_eq(&cached, &transient));
        let (_, cached_again) = arbiter.resolve("hyperbolic/llama-3.1-70b", None).unwrap();
        assert!(Arc::ptr_eq(&cached, &cached_again));
    }
}
