//! `web_search` platform tool (base spec §4.5, §5): submits a crawl job for a search
//! URL composed from the query, polls it to completion (bounded: 10 attempts, 2 s
//! delay), then appends a follow-up instruction telling the assistant how to present
//! the result. Grounded on the cancellation monitor's poll-loop shape in
//! `base_inference.py`'s `start_cancellation_listener` (bounded `time.sleep` polling),
//! the only polling pattern the source actually implements.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{PlatformToolHandler, PlatformToolOutcome, PlatformToolRequest};
use crate::error::GatewayError;

pub const MAX_POLL_ATTEMPTS: u32 = 10;
pub const POLL_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CrawlStatus {
    Pending,
    Completed { url: String, markdown: Option<String> },
    Failed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlJobId(pub u64);

/// Abstracts the external crawler/web-search backend (base spec §1 Out of scope).
#[async_trait]
pub trait CrawlClient: Send + Sync {
    async fn submit(&self, search_url: &str) -> Result<CrawlJobId, GatewayError>;

    async fn poll(&self, job: CrawlJobId) -> Result<CrawlStatus, GatewayError>;
}

pub struct WebSearchHandler {
    client: Box<dyn CrawlClient>,
    search_url_template: String,
    poll_delay: Duration,
}

impl WebSearchHandler {
    /// `search_url_template` must contain a single `{query}` placeholder.
    pub fn new(client: Box<dyn CrawlClient>, search_url_template: impl Into<String>) -> Self {
        Self {
            client,
            search_url_template: search_url_template.into(),
            poll_delay: POLL_DELAY,
        }
    }

    pub fn with_poll_delay(mut self, poll_delay: Duration) -> Self {
        self.poll_delay = poll_delay;
        self
    }

    fn search_url(&self, query: &str) -> String {
        self.search_url_template.replace("{query}", &urlencode(query))
    }
}

fn urlencode(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            ' ' => "+".to_string(),
            c if c.is_ascii_alphanumeric() || "-_.~".contains(c) => c.to_string(),
            c => format!("%{:02X}", c as u32),
        })
        .collect()
}

#[async_trait]
impl PlatformToolHandler for WebSearchHandler {
    async fn handle(&self, request: PlatformToolRequest) -> Result<PlatformToolOutcome, GatewayError> {
        let query = request
            .arguments
            .get("query")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| GatewayError::Tool("web_search call is missing `query`".to_string()))?;

        let job = self.client.submit(&self.search_url(query)).await?;

        let mut status = CrawlStatus::Pending;
        for attempt in 0..MAX_POLL_ATTEMPTS {
            status = self.client.poll(job).await?;
            if !matches!(status, CrawlStatus::Pending) {
                break;
            }
            if attempt + 1 < MAX_POLL_ATTEMPTS {
                tokio::time::sleep(self.poll_delay).await;
            }
        }

        let tool_message = match status {
            CrawlStatus::Completed { url, markdown } => {
                let body = markdown.unwrap_or_default();
                format!(
                    "Search result from {url}:\n{body}\n\nPresent these findings to the user in your own words, citing the source URL.",
                )
            }
            CrawlStatus::Failed(reason) => {
                format!("web_search failed: {reason}")
            }
            CrawlStatus::Pending => "web_search timed out waiting for the crawl job to complete.".to_string(),
        };

        Ok(PlatformToolOutcome {
            tool_message,
            chunks: Vec::new(),
        })
    }
}
