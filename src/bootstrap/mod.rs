//! Bootstrap system for cortexrag
//!
//! Builds the session and service clients once, then hands out pipelines and
//! recorded apps that share them.

use std::sync::Arc;
use tracing::debug;

use crate::cli::Config;
use crate::completion::{CompletionService, CortexCompleteClient};
use crate::errors::Result;
use crate::feedback::{default_feedbacks, CortexJudge, FeedbackProvider, RecordedApp};
use crate::rag::{ContextFilter, RAGPipeline};
use crate::search::{CortexSearchClient, Retriever, SearchService};
use crate::session::{Credentials, Session};
use crate::telemetry::TelemetryCollector;

/// App name used for both pipeline variants
pub const APP_NAME: &str = "RAG";

/// Version tag of the unfiltered pipeline
pub const UNFILTERED_VERSION: &str = "v1";

/// Version tag of the filtered pipeline
pub const FILTERED_VERSION: &str = "v2";

/// Shared clients and configuration
#[derive(Clone)]
pub struct Bootstrap {
    config: Config,
    search: Arc<dyn SearchService>,
    completion: Arc<dyn CompletionService>,
    telemetry: TelemetryCollector,
}

impl Bootstrap {
    /// Wire components around existing service implementations
    pub fn new(
        config: Config,
        search: Arc<dyn SearchService>,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        Self {
            config,
            search,
            completion,
            telemetry: TelemetryCollector::new(),
        }
    }

    /// Log in and build the Cortex clients
    pub async fn connect(config: Config, credentials: &Credentials) -> Result<Self> {
        let session = Session::connect(credentials, &config.connection).await?;
        Ok(Self::from_session(config, session))
    }

    /// Build the Cortex clients on an existing session
    pub fn from_session(config: Config, session: Session) -> Self {
        let search = Arc::new(CortexSearchClient::new(session.clone()));
        let completion = Arc::new(CortexCompleteClient::new(session));
        Self::new(config, search, completion)
    }

    pub fn retriever(&self) -> Retriever {
        Retriever::with_params(
            self.search.clone(),
            &self.config.search.column,
            self.config.search.limit,
        )
    }

    /// Judge used by the relevance filter and the feedbacks
    pub fn judge(&self) -> Arc<dyn FeedbackProvider> {
        Arc::new(CortexJudge::new(self.completion.clone(), self.config.judge_model()))
    }

    /// Pipeline variant, filtered or not
    pub fn pipeline(&self, filtered: bool) -> RAGPipeline {
        let pipeline = RAGPipeline::new(
            self.retriever(),
            self.completion.clone(),
            &self.config.completion.model,
        )
        .with_telemetry(self.telemetry.clone());

        debug!(filtered, model = %self.config.completion.model, "building pipeline");
        if filtered {
            pipeline.with_filter(ContextFilter::new(self.judge()))
        } else {
            pipeline
        }
    }

    /// Pipeline variant wrapped with the standard feedbacks
    pub fn recorded_app(&self, filtered: bool) -> RecordedApp {
        let version = if filtered { FILTERED_VERSION } else { UNFILTERED_VERSION };
        RecordedApp::new(
            APP_NAME,
            version,
            self.pipeline(filtered),
            default_feedbacks(),
            self.judge(),
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.telemetry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{SearchRequest, SearchResponse};
    use async_trait::async_trait;

    struct NoHits;

    #[async_trait]
    impl SearchService for NoHits {
        async fn search(&self, _request: &SearchRequest) -> Result<SearchResponse> {
            Ok(SearchResponse::default())
        }
    }

    struct Silent;

    #[async_trait]
    impl CompletionService for Silent {
        async fn complete(&self, _model: &str, _prompt: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    fn bootstrap(config: Config) -> Bootstrap {
        Bootstrap::new(config, Arc::new(NoHits), Arc::new(Silent))
    }

    #[test]
    fn test_pipeline_variants() {
        let bootstrap = bootstrap(Config::default());
        assert!(!bootstrap.pipeline(false).is_filtered());
        assert!(bootstrap.pipeline(true).is_filtered());
    }

    #[test]
    fn test_retriever_follows_config() {
        let mut config = Config::default();
        config.search.limit = 7;
        config.search.column = "BODY".to_string();

        let retriever = bootstrap(config).retriever();
        assert_eq!(retriever.limit(), 7);
        assert_eq!(retriever.column(), "BODY");
    }

    #[test]
    fn test_recorded_app_versions() {
        let bootstrap = bootstrap(Config::default());

        let v1 = bootstrap.recorded_app(false);
        assert_eq!(v1.app_name(), "RAG");
        assert_eq!(v1.app_version(), "v1");
        assert_eq!(v1.feedbacks().len(), 3);

        let v2 = bootstrap.recorded_app(true);
        assert_eq!(v2.app_version(), "v2");
        assert!(v2.pipeline().is_filtered());
    }
}
