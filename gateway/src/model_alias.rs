//! Unified model id → provider-specific id resolution (base spec §6, §9 Design Notes).
//!
//! The base spec's "Unresolved / ambiguous source behaviors" decision: the original
//! source forced a fixed model id per provider regardless of caller input
//! (`_get_model_map`); that override is removed here. This map is the sole authority,
//! and an id with no entry passes through unchanged — the caller's choice is
//! respected unless explicitly aliased.

use std::collections::HashMap;

/// Resolves a unified model id (as given by the caller) to the id a provider's
/// `/v1/chat/completions` endpoint expects.
pub struct ModelAliasResolver {
    aliases: HashMap<String, String>,
}

impl ModelAliasResolver {
    pub fn new() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    pub fn with_alias(mut self, unified: impl Into<String>, provider_id: impl Into<String>) -> Self {
        self.aliases.insert(unified.into(), provider_id.into());
        self
    }

    /// Returns the provider-specific id, falling back to `model_id` unchanged when no
    /// alias is registered.
    pub fn resolve<'a>(&'a self, model_id: &'a str) -> &'a str {
        self.aliases
            .get(model_id)
            .map(|s| s.as_str())
            .unwrap_or(model_id)
    }
}

impl Default for ModelAliasResolver {
    fn default() -> Self {
        Self::new()
    }
}
