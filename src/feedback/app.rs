//! Recorded applications and the evaluation leaderboard
//!
//! `RecordedApp` pairs a pipeline with its feedbacks. Recording runs the
//! pipeline; evaluation scores a finished record and never touches the
//! pipeline again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::errors::Result;
use crate::feedback::definitions::{Feedback, FeedbackResult};
use crate::feedback::provider::FeedbackProvider;
use crate::rag::{QueryTrace, RAGPipeline};

/// One recorded pipeline invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub record_id: Uuid,
    pub app_name: String,
    pub app_version: String,
    pub timestamp: DateTime<Utc>,
    pub trace: QueryTrace,
    /// Filled in by `RecordedApp::evaluate_record`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feedback: Vec<FeedbackResult>,
}

/// Pipeline wrapped for evaluation
pub struct RecordedApp {
    app_name: String,
    app_version: String,
    pipeline: RAGPipeline,
    feedbacks: Vec<Feedback>,
    provider: Arc<dyn FeedbackProvider>,
}

impl RecordedApp {
    pub fn new(
        app_name: &str,
        app_version: &str,
        pipeline: RAGPipeline,
        feedbacks: Vec<Feedback>,
        provider: Arc<dyn FeedbackProvider>,
    ) -> Self {
        Self {
            app_name: app_name.to_string(),
            app_version: app_version.to_string(),
            pipeline,
            feedbacks,
            provider,
        }
    }

    /// Run the pipeline and capture its call sites
    pub async fn record(&self, query: &str) -> Result<Record> {
        let trace = self.pipeline.query_traced(query).await?;
        Ok(Record {
            record_id: Uuid::new_v4(),
            app_name: self.app_name.clone(),
            app_version: self.app_version.clone(),
            timestamp: Utc::now(),
            trace,
            feedback: Vec::new(),
        })
    }

    /// Score a record with every registered feedback
    pub async fn evaluate(&self, record: &Record) -> Result<Vec<FeedbackResult>> {
        let mut results = Vec::with_capacity(self.feedbacks.len());
        for feedback in &self.feedbacks {
            let result = feedback.evaluate(self.provider.as_ref(), record).await?;
            info!(
                app = %self.app_name,
                version = %self.app_version,
                feedback = %result.name,
                score = result.score,
                "feedback evaluated"
            );
            results.push(result);
        }
        Ok(results)
    }

    /// Evaluate and attach results to the record
    pub async fn evaluate_record(&self, record: &mut Record) -> Result<()> {
        record.feedback = self.evaluate(record).await?;
        Ok(())
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn app_version(&self) -> &str {
        &self.app_version
    }

    pub fn pipeline(&self) -> &RAGPipeline {
        &self.pipeline
    }

    pub fn feedbacks(&self) -> &[Feedback] {
        &self.feedbacks
    }
}

/// Mean feedback scores per app version
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub app_name: String,
    pub app_version: String,
    pub records: usize,
    /// Feedback name -> mean score
    pub scores: BTreeMap<String, f64>,
    pub mean_latency_ms: f64,
}

/// Aggregates evaluated records by app
#[derive(Debug, Default)]
pub struct Leaderboard {
    rows: BTreeMap<(String, String), (Vec<Record>, BTreeMap<String, Vec<f64>>)>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an evaluated record
    pub fn add(&mut self, record: Record) {
        let key = (record.app_name.clone(), record.app_version.clone());
        let (records, scores) = self.rows.entry(key).or_default();
        for result in &record.feedback {
            scores.entry(result.name.clone()).or_default().push(result.score);
        }
        records.push(record);
    }

    /// One row per app version, sorted by name then version
    pub fn rows(&self) -> Vec<LeaderboardRow> {
        self.rows
            .iter()
            .map(|((name, version), (records, scores))| {
                let latency: u64 = records
                    .iter()
                    .map(|r| r.trace.retrieval_ms + r.trace.completion_ms)
                    .sum();
                LeaderboardRow {
                    app_name: name.clone(),
                    app_version: version.clone(),
                    records: records.len(),
                    scores: scores
                        .iter()
                        .map(|(feedback, values)| {
                            (feedback.clone(), values.iter().sum::<f64>() / values.len() as f64)
                        })
                        .collect(),
                    mean_latency_ms: if records.is_empty() {
                        0.0
                    } else {
                        latency as f64 / records.len() as f64
                    },
                }
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::definitions::FeedbackResult;

    fn record(version: &str, scores: &[(&str, f64)], latency: u64) -> Record {
        Record {
            record_id: Uuid::new_v4(),
            app_name: "RAG".to_string(),
            app_version: version.to_string(),
            timestamp: Utc::now(),
            trace: QueryTrace {
                query: "q".to_string(),
                retrieved: vec![],
                scored: None,
                context: vec![],
                prompt: "p".to_string(),
                answer: "a".to_string(),
                retrieval_ms: latency,
                completion_ms: 0,
            },
            feedback: scores
                .iter()
                .map(|(name, score)| FeedbackResult {
                    name: name.to_string(),
                    score: *score,
                    item_scores: vec![*score],
                    reasons: Vec::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_leaderboard_means_per_version() {
        let mut board = Leaderboard::new();
        board.add(record("v1", &[("Groundedness", 0.4)], 100));
        board.add(record("v1", &[("Groundedness", 0.8)], 300));
        board.add(record("v2", &[("Groundedness", 1.0)], 50));

        let rows = board.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].app_version, "v1");
        assert_eq!(rows[0].records, 2);
        assert!((rows[0].scores["Groundedness"] - 0.6).abs() < 1e-9);
        assert_eq!(rows[0].mean_latency_ms, 200.0);
        assert_eq!(rows[1].scores["Groundedness"], 1.0);
    }

    #[test]
    fn test_record_serializes_without_empty_feedback() {
        let json = serde_json::to_value(record("v1", &[], 0)).unwrap();
        assert!(json.get("feedback").is_none());
        assert_eq!(json["app_version"], "v1");
        assert_eq!(json["trace"]["answer"], "a");
    }
}
