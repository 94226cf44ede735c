//! HTTP-backed [`CrawlClient`] against a crawler/web-search backend (base spec §1 Out
//! of scope). Submits a job, then the handler polls it on a bounded schedule.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::web_search::{CrawlClient, CrawlJobId, CrawlStatus};
use crate::error::GatewayError;

pub struct HttpCrawlClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCrawlClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Deserialize)]
struct SubmitResponse {
    job_id: u64,
}

#[derive(Deserialize)]
struct PollResponse {
    status: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl CrawlClient for HttpCrawlClient {
    async fn submit(&self, search_url: &str) -> Result<CrawlJobId, GatewayError> {
        let url = format!("{}/jobs", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&json!({"url": search_url}))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| GatewayError::Transport(e.to_string()))?
            .json::<SubmitResponse>()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;
        Ok(CrawlJobId(response.job_id))
    }

    async fn poll(&self, job: CrawlJobId) -> Result<CrawlStatus, GatewayError> {
        let url = format!("{}/jobs/{}", self.base_url.trim_end_matches('/'), job.0);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| GatewayError::Transport(e.to_string()))?
            .json::<PollResponse>()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        Ok(match response.status.as_str() {
            "completed" => CrawlStatus::Completed {
                url: response.url.unwrap_or_default(),
                markdown: response.markdown,
            },
            "failed" => CrawlStatus::Failed(response.error.unwrap_or_else(|| "crawl failed".to_string())),
            _ => CrawlStatus::Pending,
        })
    }
}
