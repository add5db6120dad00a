// End-to-end RAG pipeline: retrieve -> (filter) -> prompt -> complete
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::completion::CompletionService;
use crate::errors::Result;
use crate::rag::filter::{ContextFilter, ScoredPassage, RELEVANCE_THRESHOLD};
use crate::rag::prompt::PromptTemplate;
use crate::search::Retriever;
use crate::telemetry::{TelemetryCollector, TelemetryEvent};

/// Every call-site value of one pipeline invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryTrace {
    /// Original query
    pub query: String,
    /// Passages as returned by the retriever
    pub retrieved: Vec<String>,
    /// Filter scores, in retrieval order (filtered pipeline only)
    pub scored: Option<Vec<ScoredPassage>>,
    /// Passages that reached the prompt
    pub context: Vec<String>,
    /// Prompt sent to the model
    pub prompt: String,
    /// Model answer
    pub answer: String,
    pub retrieval_ms: u64,
    pub completion_ms: u64,
}

impl QueryTrace {
    /// Each scored passage with whether it reached the prompt, by position
    ///
    /// Passages are not deduplicated, so equal texts can get different
    /// verdicts. `None` for the unfiltered pipeline.
    pub fn filter_verdicts(&self) -> Option<Vec<(&ScoredPassage, bool)>> {
        self.scored.as_ref().map(|scored| {
            scored
                .iter()
                .map(|passage| (passage, passage.passes(RELEVANCE_THRESHOLD)))
                .collect()
        })
    }
}

/// Output of the retrieval call site
#[derive(Debug, Clone)]
struct RetrievedContext {
    retrieved: Vec<String>,
    scored: Option<Vec<ScoredPassage>>,
    context: Vec<String>,
    duration_ms: u64,
}

/// RAG pipeline with an optional relevance filter stage
#[derive(Clone)]
pub struct RAGPipeline {
    retriever: Retriever,
    filter: Option<ContextFilter>,
    template: PromptTemplate,
    completion: Arc<dyn CompletionService>,
    model: String,
    telemetry: Option<TelemetryCollector>,
}

impl RAGPipeline {
    /// Create unfiltered pipeline
    pub fn new(retriever: Retriever, completion: Arc<dyn CompletionService>, model: &str) -> Self {
        Self {
            retriever,
            filter: None,
            template: PromptTemplate::default(),
            completion,
            model: model.to_string(),
            telemetry: None,
        }
    }

    /// Add the relevance filter between retrieval and prompt assembly
    pub fn with_filter(mut self, filter: ContextFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Use a custom prompt template
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Report stage events to a shared collector
    pub fn with_telemetry(mut self, telemetry: TelemetryCollector) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Retrieval call site: passages for the prompt, filtered when configured
    pub async fn retrieve_context(&self, query: &str) -> Result<Vec<String>> {
        Ok(self.retrieve_stage(query).await?.context)
    }

    /// Generation call site: render the prompt and ask the model
    pub async fn generate_completion(&self, query: &str, context: &[String]) -> Result<String> {
        let prompt = self.template.render(context, query);
        self.complete_stage(&prompt).await.map(|(answer, _)| answer)
    }

    /// Answer a question
    pub async fn query(&self, query: &str) -> Result<String> {
        Ok(self.query_traced(query).await?.answer)
    }

    /// Answer a question and keep every intermediate value
    pub async fn query_traced(&self, query: &str) -> Result<QueryTrace> {
        self.emit(TelemetryEvent::QueryStarted);

        let retrieved = self
            .retrieve_stage(query)
            .await
            .map_err(|e| self.failed("retrieve", e))?;

        let prompt = self.template.render(&retrieved.context, query);
        debug!(%prompt, "assembled prompt");

        let (answer, completion_ms) = self
            .complete_stage(&prompt)
            .await
            .map_err(|e| self.failed("complete", e))?;

        info!(
            retrieved = retrieved.retrieved.len(),
            context = retrieved.context.len(),
            completion_ms,
            "query answered"
        );

        Ok(QueryTrace {
            query: query.to_string(),
            retrieved: retrieved.retrieved,
            scored: retrieved.scored,
            context: retrieved.context,
            prompt,
            answer,
            retrieval_ms: retrieved.duration_ms,
            completion_ms,
        })
    }

    async fn retrieve_stage(&self, query: &str) -> Result<RetrievedContext> {
        let started = Instant::now();
        let retrieved = self.retriever.retrieve(query).await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        self.emit(TelemetryEvent::Retrieved {
            count: retrieved.len(),
            duration_ms,
        });

        let Some(filter) = &self.filter else {
            self.emit(TelemetryEvent::ContextBuilt {
                passages: retrieved.len(),
            });
            return Ok(RetrievedContext {
                context: retrieved.clone(),
                retrieved,
                scored: None,
                duration_ms,
            });
        };

        let scored = filter.score(query, retrieved.clone()).await?;
        let context: Vec<String> = filter
            .select(&scored)
            .into_iter()
            .map(|p| p.text)
            .collect();

        self.emit(TelemetryEvent::Filtered {
            kept: context.len(),
            dropped: retrieved.len() - context.len(),
        });
        self.emit(TelemetryEvent::ContextBuilt {
            passages: context.len(),
        });

        // An empty context still goes to the model; the prompt tells it to
        // say the information is missing.
        Ok(RetrievedContext {
            retrieved,
            scored: Some(scored),
            context,
            duration_ms,
        })
    }

    async fn complete_stage(&self, prompt: &str) -> Result<(String, u64)> {
        let started = Instant::now();
        let answer = self.completion.complete(&self.model, prompt).await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        self.emit(TelemetryEvent::Completed {
            answer_chars: answer.len(),
            duration_ms,
        });

        Ok((answer, duration_ms))
    }

    fn emit(&self, event: TelemetryEvent) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.record(event);
        }
    }

    /// Record a stage failure and hand the error back untouched
    fn failed(&self, stage: &str, error: crate::errors::RagError) -> crate::errors::RagError {
        self.emit(TelemetryEvent::Failed {
            stage: stage.to_string(),
            error: error.to_string(),
        });
        error
    }

    /// Check if the relevance filter is active
    pub fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }
}
