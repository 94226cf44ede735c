use crate::{ModelLimitResolver, ModelSpec};
use std::path::PathBuf;

/// Resolves model specs from a JSON file: `[{"model_id", "context_limit", "output_limit",
/// "cache_read", "cache_write"}, ...]`. Read once at construction; operators who need live
/// reload can wrap this in their own polling (not provided here — see
/// `gateway::model_alias` for the alias map, which is the more common live-reload need).
pub struct LocalFileResolver {
    specs: Vec<ModelSpec>,
}

impl LocalFileResolver {
    pub fn load(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let text = std::fs::read_to_string(&path)?;
        let specs: Vec<ModelSpec> = serde_json::from_str(&text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Self { specs })
    }

    pub fn empty() -> Self {
        Self { specs: Vec::new() }
    }
}

impl ModelLimitResolver for LocalFileResolver {
    fn resolve(&self, model_id: &str) -> Option<ModelSpec> {
        self.specs.iter().find(|s| s.model_id == model_id).cloned()
    }
}
