//! Typed environment configuration (base spec §6 env vars; SPEC_FULL §10 A3).
//!
//! `GatewayConfig::from_env` is called once at process start, after
//! `env_config::load_and_apply` has merged `.env`/XDG values into the process
//! environment (existing env always wins — see the `config` crate).

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
}

/// An API key that never prints its value. Every log line and error message that might
/// hold one goes through this type instead of a bare `String`.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted>")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted>")
    }
}

/// Process-wide gateway configuration, resolved once from the environment.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub base_url: Option<String>,
    pub admin_api_key: Option<ApiKey>,
    pub hyperbolic_base_url: Option<String>,
    pub together_base_url: Option<String>,
    pub deepseek_base_url: Option<String>,
    pub storage_base_url: Option<String>,
    pub redis_url: Option<String>,
    pub shell_server_url: Option<String>,
    pub code_execution_url: Option<String>,
    pub vector_index_url: Option<String>,
    pub web_search_url_template: Option<String>,
    pub crawl_api_url: Option<String>,
    pub signed_url_secret: Option<ApiKey>,
    pub event_queue_capacity: usize,
    pub append_queue_capacity: usize,
}

impl GatewayConfig {
    /// Reads every env var the gateway consumes. Never panics on a missing var:
    /// providers without a configured base URL simply fail at selection time with a
    /// `GatewayError::Config`, per base spec §4.2/§7.
    pub fn from_env() -> Self {
        Self {
            base_url: opt_var("BASE_URL"),
            admin_api_key: opt_var("ADMIN_API_KEY").map(ApiKey::new),
            hyperbolic_base_url: opt_var("HYPERBOLIC_BASE_URL"),
            together_base_url: opt_var("TOGETHER_BASE_URL"),
            deepseek_base_url: opt_var("DEEPSEEK_BASE_URL"),
            storage_base_url: opt_var("STORAGE_BASE_URL"),
            redis_url: opt_var("REDIS_URL"),
            shell_server_url: opt_var("SHELL_SERVER_URL"),
            code_execution_url: opt_var("CODE_EXECUTION_URL"),
            vector_index_url: opt_var("VECTOR_INDEX_URL"),
            web_search_url_template: opt_var("WEB_SEARCH_URL_TEMPLATE"),
            crawl_api_url: opt_var("CRAWL_API_URL"),
            signed_url_secret: opt_var("SIGNED_URL_SECRET").map(ApiKey::new),
            event_queue_capacity: 128,
            append_queue_capacity: 64,
        }
    }

    pub fn base_url_for_provider(&self, provider: &str) -> Option<&str> {
        match provider {
            "hyperbolic" => self.hyperbolic_base_url.as_deref(),
            "together-ai" => self.together_base_url.as_deref(),
            "deepseek-ai" => self.deepseek_base_url.as_deref(),
            _ => self.base_url.as_deref(),
        }
    }
}

fn opt_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
