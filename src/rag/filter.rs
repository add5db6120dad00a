// Context-relevance gate applied between retrieval and prompt assembly
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::feedback::FeedbackProvider;

/// Minimum context-relevance score a passage needs to reach the prompt
pub const RELEVANCE_THRESHOLD: f64 = 0.75;

/// Passage with its relevance to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub text: String,
    pub score: f64,
}

impl ScoredPassage {
    pub fn passes(&self, threshold: f64) -> bool {
        self.score >= threshold
    }
}

/// Drops retrieved passages that score below the relevance threshold
#[derive(Clone)]
pub struct ContextFilter {
    provider: Arc<dyn FeedbackProvider>,
    threshold: f64,
}

impl ContextFilter {
    pub fn new(provider: Arc<dyn FeedbackProvider>) -> Self {
        Self {
            provider,
            threshold: RELEVANCE_THRESHOLD,
        }
    }

    /// Score every passage, in retrieval order
    pub async fn score(&self, query: &str, passages: Vec<String>) -> Result<Vec<ScoredPassage>> {
        let mut scored = Vec::with_capacity(passages.len());
        for text in passages {
            let score = self.provider.context_relevance(query, &text).await?;
            scored.push(ScoredPassage { text, score });
        }
        Ok(scored)
    }

    /// Keep passages with `score >= threshold`, preserving order
    pub fn select(&self, scored: &[ScoredPassage]) -> Vec<ScoredPassage> {
        let kept: Vec<ScoredPassage> = scored
            .iter()
            .filter(|p| p.passes(self.threshold))
            .cloned()
            .collect();

        debug!(total = scored.len(), kept = kept.len(), threshold = self.threshold, "context filter");
        if !scored.is_empty() && kept.is_empty() {
            warn!(total = scored.len(), "no retrieved passage met the relevance threshold");
        }
        kept
    }

    /// Score and select in one step
    pub async fn filter(&self, query: &str, passages: Vec<String>) -> Result<Vec<ScoredPassage>> {
        let scored = self.score(query, passages).await?;
        Ok(self.select(&scored))
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}
