//! Cortex Search service client
//!
//! Endpoint: POST /api/v2/databases/{db}/schemas/{schema}/cortex-search-services/{service}:query

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{RagError, Result};
use crate::session::Session;

/// Search request sent to the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub columns: Vec<String>,
    pub limit: usize,
}

/// Ordered search hits, best first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub request_id: Option<String>,
}

/// A managed document search service
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse>;
}

/// HTTP client for one Cortex Search service
#[derive(Clone)]
pub struct CortexSearchClient {
    session: Session,
    path: String,
}

impl CortexSearchClient {
    /// Client for the service named in the session
    pub fn new(session: Session) -> Self {
        let path = format!(
            "/api/v2/databases/{}/schemas/{}/cortex-search-services/{}:query",
            session.database(),
            session.schema(),
            session.search_service()
        );
        Self { session, path }
    }

    /// Request path for this service
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl SearchService for CortexSearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        debug!(path = %self.path, limit = request.limit, "cortex search");

        let response = self.session.post(&self.path).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::SearchError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let body: SearchResponse = response.json().await?;
        debug!(hits = body.results.len(), request_id = ?body.request_id, "cortex search done");
        Ok(body)
    }
}
