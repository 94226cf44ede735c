use crate::{ModelLimitResolver, ModelSpec};
use std::collections::HashMap;
use std::sync::Mutex;

/// Caches resolved specs in memory so repeat lookups for the same model id (the common
/// case: one run after another against the same assistant) skip the inner resolver.
pub struct CachedResolver<R: ModelLimitResolver> {
    inner: R,
    cache: Mutex<HashMap<String, Option<ModelSpec>>>,
}

impl<R: ModelLimitResolver> CachedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl<R: ModelLimitResolver> ModelLimitResolver for CachedResolver<R> {
    fn resolve(&self, model_id: &str) -> Option<ModelSpec> {
        if let Some(hit) = self.cache.lock().unwrap().get(model_id) {
            return hit.clone();
        }
        let resolved = self.inner.resolve(model_id);
        self.cache
            .lock()
            .unwrap()
            .insert(model_id.to_string(), resolved.clone());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BuiltinTableResolver;

    #[test]
    fn caches_hits_and_misses() {
        let cached = CachedResolver::new(BuiltinTableResolver);
        assert!(cached.resolve("gpt-4o").is_some());
        assert!(cached.resolve("gpt-4o").is_some());
        assert!(cached.resolve("nope").is_none());
        assert!(cached.resolve("nope").is_none());
        assert_eq!(cached.cache.lock().unwrap().len(), 2);
    }
}
