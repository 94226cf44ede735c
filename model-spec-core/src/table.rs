use crate::{ModelLimitResolver, ModelSpec};

/// Built-in table of well-known model ids. Covers the providers the gateway routes to
/// out of the box; anything else falls through to the next resolver in a
/// [`crate::CompositeResolver`] chain.
pub struct BuiltinTableResolver;

const TABLE: &[(&str, u32, u32)] = &[
    ("gpt-4o", 128_000, 16_384),
    ("gpt-4o-mini", 128_000, 16_384),
    ("hyperbolic/llama-3.1-70b", 128_000, 8_192),
    ("hyperbolic/llama-3.1-405b", 128_000, 8_192),
    ("together-ai/llama-3.1-70b", 128_000, 8_192),
    ("deepseek-ai/deepseek-v3", 64_000, 8_192),
    ("deepseek-ai/deepseek-r1", 64_000, 8_192),
    ("groq/llama-3.1-8b", 128_000, 8_192),
    ("azure/gpt-4o", 128_000, 16_384),
    ("google/gemini-1.5-pro", 1_000_000, 8_192),
];

impl ModelLimitResolver for BuiltinTableResolver {
    fn resolve(&self, model_id: &str) -> Option<ModelSpec> {
        TABLE
            .iter()
            .find(|(id, _, _)| *id == model_id)
            .map(|(id, ctx, out)| ModelSpec::new(*id, *ctx, *out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_model() {
        let r = BuiltinTableResolver;
        let spec = r.resolve("gpt-4o").unwrap();
        assert_eq!(spec.context_limit, 128_000);
    }

    #[test]
    fn unknown_model_returns_none() {
        let r = BuiltinTableResolver;
        assert!(r.resolve("nonexistent/model").is_none());
    }
}
