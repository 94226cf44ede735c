use crate::{ModelLimitResolver, ModelSpec};

/// Tries a list of resolvers in order; the first to return `Some` wins.
pub struct CompositeResolver {
    resolvers: Vec<Box<dyn ModelLimitResolver>>,
}

impl CompositeResolver {
    pub fn new(resolvers: Vec<Box<dyn ModelLimitResolver>>) -> Self {
        Self { resolvers }
    }
}

impl ModelLimitResolver for CompositeResolver {
    fn resolve(&self, model_id: &str) -> Option<ModelSpec> {
        self.resolvers.iter().find_map(|r| r.resolve(model_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BuiltinTableResolver;

    struct AlwaysNone;
    impl ModelLimitResolver for AlwaysNone {
        fn resolve(&self, _model_id: &str) -> Option<ModelSpec> {
            None
        }
    }

    #[test]
    fn falls_through_to_next_resolver() {
        let composite = CompositeResolver::new(vec![
            Box::new(AlwaysNone),
            Box::new(BuiltinTableResolver),
        ]);
        let spec = composite.resolve("gpt-4o").unwrap();
        assert_eq!(spec.context_limit, 128_000);
    }

    #[test]
    fn no_resolver_matches() {
        let composite = CompositeResolver::new(vec![Box::new(AlwaysNone)]);
        assert!(composite.resolve("gpt-4o").is_none());
    }
}
