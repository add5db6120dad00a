//! Retriever: query text in, ranked passage texts out

use std::sync::Arc;
use tracing::debug;

use crate::cli::config::{DEFAULT_SEARCH_COLUMN, DEFAULT_SEARCH_LIMIT};
use crate::errors::{RagError, Result};
use crate::search::client::{SearchRequest, SearchService};

/// Pulls one text column from the top hits of a search service
#[derive(Clone)]
pub struct Retriever {
    service: Arc<dyn SearchService>,
    column: String,
    limit: usize,
}

impl Retriever {
    /// Create retriever with the default column and limit
    pub fn new(service: Arc<dyn SearchService>) -> Self {
        Self::with_params(service, DEFAULT_SEARCH_COLUMN, DEFAULT_SEARCH_LIMIT)
    }

    /// Create retriever with custom column and limit
    pub fn with_params(service: Arc<dyn SearchService>, column: &str, limit: usize) -> Self {
        Self {
            service,
            column: column.to_string(),
            limit,
        }
    }

    /// Retrieve at most `limit` passages, in service rank order
    pub async fn retrieve(&self, query: &str) -> Result<Vec<String>> {
        let request = SearchRequest {
            query: query.to_string(),
            columns: vec![self.column.clone()],
            limit: self.limit,
        };

        let response = self.service.search(&request).await?;

        let passages = response
            .results
            .iter()
            .take(self.limit)
            .map(|hit| match hit.get(&self.column) {
                Some(serde_json::Value::String(text)) => Ok(text.clone()),
                _ => Err(RagError::MissingField {
                    field: self.column.clone(),
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(count = passages.len(), "retrieved passages");
        Ok(passages)
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::client::SearchResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns canned hits and remembers the last request
    struct CannedSearch {
        hits: Vec<serde_json::Value>,
        last_request: Mutex<Option<SearchRequest>>,
    }

    impl CannedSearch {
        fn new(hits: Vec<serde_json::Value>) -> Arc<Self> {
            Arc::new(Self {
                hits,
                last_request: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl SearchService for CannedSearch {
        async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
            *self.last_request.lock().unwrap() = Some(request.clone());
            Ok(SearchResponse {
                results: self
                    .hits
                    .iter()
                    .map(|h| h.as_object().unwrap().clone())
                    .collect(),
                request_id: None,
            })
        }
    }

    #[tokio::test]
    async fn test_retrieve_extracts_column_in_order() {
        let service = CannedSearch::new(vec![
            json!({ "SUMMARY": "first", "TITLE": "a" }),
            json!({ "SUMMARY": "second", "TITLE": "b" }),
        ]);
        let retriever = Retriever::new(service.clone());

        let passages = retriever.retrieve("q").await.unwrap();
        assert_eq!(passages, vec!["first", "second"]);

        let request = service.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.columns, vec!["SUMMARY"]);
        assert_eq!(request.limit, 4);
        assert_eq!(request.query, "q");
    }

    #[tokio::test]
    async fn test_retrieve_truncates_to_limit() {
        let hits = (0..10).map(|i| json!({ "SUMMARY": format!("p{}", i) })).collect();
        let retriever = Retriever::with_params(CannedSearch::new(hits), "SUMMARY", 3);

        let passages = retriever.retrieve("q").await.unwrap();
        assert_eq!(passages, vec!["p0", "p1", "p2"]);
    }

    #[tokio::test]
    async fn test_retrieve_empty_results() {
        let retriever = Retriever::new(CannedSearch::new(vec![]));
        assert!(retriever.retrieve("q").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_column_is_error() {
        let retriever = Retriever::new(CannedSearch::new(vec![json!({ "TITLE": "no summary" })]));
        let result = retriever.retrieve("q").await;
        assert!(matches!(result, Err(RagError::MissingField { ref field }) if field == "SUMMARY"));
    }

    #[tokio::test]
    async fn test_non_string_column_is_error() {
        let retriever = Retriever::new(CannedSearch::new(vec![json!({ "SUMMARY": 42 })]));
        assert!(retriever.retrieve("q").await.is_err());
    }
}
