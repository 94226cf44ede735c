//! HTTP-backed [`VectorIndexClient`], querying a Qdrant-style vector index over a
//! plain JSON request/response (base spec §1 Out of scope: "the Qdrant-style vector
//! index" is an external collaborator; this is the client for it).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::vector_store::{VectorIndexClient, VectorSearchResult};
use crate::error::GatewayError;

pub struct HttpVectorIndexClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVectorIndexClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Deserialize)]
struct SearchHit {
    id: String,
    score: f32,
    text: String,
    #[serde(default)]
    metadata: Value,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

#[async_trait]
impl VectorIndexClient for HttpVectorIndexClient {
    async fn search(
        &self,
        store_id: &str,
        query: &str,
        filter: Option<&Value>,
        top_k: usize,
    ) -> Result<Vec<VectorSearchResult>, GatewayError> {
        let url = format!("{}/stores/{}/search", self.base_url.trim_end_matches('/'), store_id);
        let body = json!({"query": query, "filter": filter, "top_k": top_k});
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| GatewayError::Transport(e.to_string()))?
            .json::<SearchResponse>()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        Ok(response
            .results
            .into_iter()
            .map(|hit| VectorSearchResult {
                id: hit.id,
                score: hit.score,
                text: hit.text,
                metadata: hit.metadata,
            })
            .collect())
    }
}
