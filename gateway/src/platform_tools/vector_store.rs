//! `vector_store_search` platform tool (base spec §4.5): a single request/response
//! lookup against the attached vector store, no polling. Grounded on
//! `vector_store.py`'s `query_store` (filter-to-query-vector shape), adapted to the
//! text-query + `$`-operator filter contract the tool parser already validates via
//! [`crate::tool_parser::is_complex_vector_search`].

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{PlatformToolHandler, PlatformToolOutcome, PlatformToolRequest};
use crate::error::GatewayError;

#[derive(Clone, Debug, PartialEq)]
pub struct VectorSearchResult {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub metadata: Value,
}

/// Abstracts the external vector index (base spec §1 Out of scope: "the Qdrant-style
/// vector index").
#[async_trait]
pub trait VectorIndexClient: Send + Sync {
    async fn search(
        &self,
        store_id: &str,
        query: &str,
        filter: Option<&Value>,
        top_k: usize,
    ) -> Result<Vec<VectorSearchResult>, GatewayError>;
}

pub struct VectorStoreHandler {
    client: Box<dyn VectorIndexClient>,
    store_id: String,
    top_k: usize,
}

impl VectorStoreHandler {
    pub fn new(client: Box<dyn VectorIndexClient>, store_id: impl Into<String>) -> Self {
        Self {
            client,
            store_id: store_id.into(),
            top_k: 5,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

#[async_trait]
impl PlatformToolHandler for VectorStoreHandler {
    async fn handle(&self, request: PlatformToolRequest) -> Result<PlatformToolOutcome, GatewayError> {
        let query = request
            .arguments
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::Tool("vector_store_search call is missing `query`".to_string()))?;
        let filter = request.arguments.get("filter");

        let results = self
            .client
            .search(&self.store_id, query, filter, self.top_k)
            .await?;

        let payload = json!(results
            .iter()
            .map(|r| json!({
                "id": r.id,
                "score": r.score,
                "text": r.text,
                "metadata": r.metadata,
            }))
            .collect::<Vec<_>>());

        Ok(PlatformToolOutcome {
            tool_message: payload.to_string(),
            chunks: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    struct FakeIndex;

    #[async_trait]
    impl VectorIndexClient for FakeIndex {
        async fn search(
            &self,
            _store_id: &str,
            query: &str,
            _filter: Option<&Value>,
            _top_k: usize,
        ) -> Result<Vec<VectorSearchResult>, GatewayError> {
            Ok(vec![VectorSearchResult {
                id: "1".to_string(),
                score: 0.9,
                text: format!("matched: {query}"),
                metadata: json!({}),
            }])
        }
    }

    #[tokio::test]
    async fn handle_stringifies_ranked_results() {
        let handler = VectorStoreHandler::new(Box::new(FakeIndex), "store-1");
        let mut args = Map::new();
        args.insert("query".to_string(), Value::String("capital of France".to_string()));
        let outcome = handler
            .handle(PlatformToolRequest {
                thread_id: "t1".to_string(),
                run_id: "r1".to_string(),
                arguments: args,
            })
            .await
            .unwrap();
        assert!(outcome.tool_message.contains("matched: capital of France"));
        assert!(outcome.chunks.is_empty());
    }

    #[tokio::test]
    async fn handle_rejects_missing_query() {
        let handler = VectorStoreHandler::new(Box::new(FakeIndex), "store-1");
        let result = handler
            .handle(PlatformToolRequest {
                thread_id: "t1".to_string(),
                run_id: "r1".to_string(),
                arguments: Map::new(),
            })
            .await;
        assert!(result.is_err());
    }
}
