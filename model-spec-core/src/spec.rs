use serde::{Deserialize, Serialize};

/// Context/output token limits for one model id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub model_id: String,
    pub context_limit: u32,
    pub output_limit: u32,
    pub cache_read: bool,
    pub cache_write: bool,
}

impl ModelSpec {
    pub fn new(model_id: impl Into<String>, context_limit: u32, output_limit: u32) -> Self {
        Self {
            model_id: model_id.into(),
            context_limit,
            output_limit,
            cache_read: false,
            cache_write: false,
        }
    }

    pub fn with_cache_read(mut self, v: bool) -> Self {
        self.cache_read = v;
        self
    }

    pub fn with_cache_write(mut self, v: bool) -> Self {
        self.cache_write = v;
        self
    }
}
