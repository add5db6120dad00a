//! Feedback functions bound to pipeline call sites
//!
//! A `Feedback` names a metric, the recorded values it reads and how its
//! per-item scores are combined. Evaluation only reads a finished record.

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::feedback::app::Record;
use crate::feedback::provider::{FeedbackProvider, Rating};

/// Recorded value a feedback reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selector {
    /// The question passed to `query`
    Input,
    /// The final answer
    Output,
    /// Each passage returned by the retrieval call site
    RetrievedContext,
    /// All retrieval passages joined into one source text
    RetrievedContextCollected,
}

impl Selector {
    /// Values this selector picks out of a record
    pub fn select(&self, record: &Record) -> Vec<String> {
        let trace = &record.trace;
        match self {
            Selector::Input => vec![trace.query.clone()],
            Selector::Output => vec![trace.answer.clone()],
            Selector::RetrievedContext => trace.context.clone(),
            Selector::RetrievedContextCollected => vec![trace.context.join("\n")],
        }
    }
}

/// How per-item scores become one value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    Mean,
    Min,
    Max,
}

impl Aggregation {
    /// Combine scores; no scores gives 0
    pub fn apply(&self, scores: &[f64]) -> f64 {
        if scores.is_empty() {
            return 0.0;
        }
        match self {
            Aggregation::Mean => scores.iter().sum::<f64>() / scores.len() as f64,
            Aggregation::Min => scores.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::Max => scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Metric computed by a feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackKind {
    Groundedness,
    ContextRelevance,
    AnswerRelevance,
}

/// A named metric wired to two call sites
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub name: String,
    pub kind: FeedbackKind,
    /// First argument selector
    pub on_first: Selector,
    /// Second argument selector
    pub on_second: Selector,
    pub aggregation: Aggregation,
}

/// Outcome of one feedback on one record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub name: String,
    pub score: f64,
    /// Per-item scores before aggregation
    pub item_scores: Vec<f64>,
    /// Judge reasoning behind the item scores, where the provider gave any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

impl Feedback {
    /// Support of each answer sentence by the collected retrieval context
    pub fn groundedness() -> Self {
        Self {
            name: "Groundedness".to_string(),
            kind: FeedbackKind::Groundedness,
            on_first: Selector::RetrievedContextCollected,
            on_second: Selector::Output,
            aggregation: Aggregation::Mean,
        }
    }

    /// Relevance of each retrieved passage to the question
    pub fn context_relevance() -> Self {
        Self {
            name: "Context Relevance".to_string(),
            kind: FeedbackKind::ContextRelevance,
            on_first: Selector::Input,
            on_second: Selector::RetrievedContext,
            aggregation: Aggregation::Mean,
        }
    }

    /// Relevance of the answer to the question
    pub fn answer_relevance() -> Self {
        Self {
            name: "Answer Relevance".to_string(),
            kind: FeedbackKind::AnswerRelevance,
            on_first: Selector::Input,
            on_second: Selector::Output,
            aggregation: Aggregation::Mean,
        }
    }

    /// Score a finished record
    pub async fn evaluate(
        &self,
        provider: &dyn FeedbackProvider,
        record: &Record,
    ) -> Result<FeedbackResult> {
        let firsts = self.on_first.select(record);
        let seconds = self.on_second.select(record);

        let mut item_scores = Vec::new();
        let mut reasons = Vec::new();
        for first in &firsts {
            for second in &seconds {
                match self.kind {
                    FeedbackKind::ContextRelevance => {
                        let rating = provider.context_relevance_with_reasons(first, second).await?;
                        item_scores.push(keep_reason(rating, None, &mut reasons));
                    }
                    FeedbackKind::AnswerRelevance => {
                        let rating = provider.answer_relevance_with_reasons(first, second).await?;
                        item_scores.push(keep_reason(rating, None, &mut reasons));
                    }
                    FeedbackKind::Groundedness => {
                        // Score per statement, then reduce to one item
                        let mut statement_scores = Vec::new();
                        for statement in split_sentences(second) {
                            let rating = provider.groundedness_with_reasons(first, &statement).await?;
                            statement_scores.push(keep_reason(rating, Some(&statement), &mut reasons));
                        }
                        item_scores.push(Aggregation::Mean.apply(&statement_scores));
                    }
                }
            }
        }

        Ok(FeedbackResult {
            name: self.name.clone(),
            score: self.aggregation.apply(&item_scores),
            item_scores,
            reasons,
        })
    }
}

/// Collect a rating's reason, labelled with the statement it judged
fn keep_reason(rating: Rating, statement: Option<&str>, reasons: &mut Vec<String>) -> f64 {
    if let Some(reason) = rating.reason {
        reasons.push(match statement {
            Some(statement) => format!("{} -> {}", statement, reason),
            None => reason,
        });
    }
    rating.score
}

/// The three standard feedbacks
pub fn default_feedbacks() -> Vec<Feedback> {
    vec![
        Feedback::context_relevance(),
        Feedback::answer_relevance(),
        Feedback::groundedness(),
    ]
}

/// Split text into sentences on `.`, `!` and `?` followed by whitespace or end
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().map_or(true, |next| next.is_whitespace());
        if at_boundary {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("X is a widget. It costs $3.50! Why? Because"),
            vec!["X is a widget.", "It costs $3.50!", "Why?", "Because"]
        );
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_aggregations() {
        let scores = [0.2, 0.4, 0.9];
        assert!((Aggregation::Mean.apply(&scores) - 0.5).abs() < 1e-9);
        assert_eq!(Aggregation::Min.apply(&scores), 0.2);
        assert_eq!(Aggregation::Max.apply(&scores), 0.9);
        assert_eq!(Aggregation::Mean.apply(&[]), 0.0);
    }

    #[test]
    fn test_default_feedbacks_names() {
        let names: Vec<String> = default_feedbacks().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["Context Relevance", "Answer Relevance", "Groundedness"]);
    }

    #[test]
    fn test_feedback_wiring() {
        let groundedness = Feedback::groundedness();
        assert_eq!(groundedness.on_first, Selector::RetrievedContextCollected);
        assert_eq!(groundedness.on_second, Selector::Output);

        let context = Feedback::context_relevance();
        assert_eq!(context.on_first, Selector::Input);
        assert_eq!(context.on_second, Selector::RetrievedContext);
    }

    use crate::feedback::app::Record;
    use crate::rag::QueryTrace;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use uuid::Uuid;

    /// Looks every score up by its second argument
    struct Table {
        scores: HashMap<String, f64>,
        reasons: bool,
    }

    impl Table {
        fn new(scores: &[(&str, f64)]) -> Self {
            Self {
                scores: scores.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                reasons: false,
            }
        }

        fn score(&self, key: &str) -> Result<f64> {
            Ok(self.scores.get(key).copied().unwrap_or(0.0))
        }
    }

    #[async_trait]
    impl FeedbackProvider for Table {
        async fn context_relevance(&self, _question: &str, context: &str) -> Result<f64> {
            self.score(context)
        }

        async fn answer_relevance(&self, _question: &str, answer: &str) -> Result<f64> {
            self.score(answer)
        }

        async fn groundedness(&self, _source: &str, statement: &str) -> Result<f64> {
            self.score(statement)
        }

        async fn groundedness_with_reasons(&self, source: &str, statement: &str) -> Result<Rating> {
            let score = self.groundedness(source, statement).await?;
            Ok(Rating {
                score,
                reason: self.reasons.then(|| format!("rated {}", score)),
            })
        }
    }

    fn record(context: &[&str], answer: &str) -> Record {
        Record {
            record_id: Uuid::new_v4(),
            app_name: "RAG".to_string(),
            app_version: "v1".to_string(),
            timestamp: Utc::now(),
            trace: QueryTrace {
                query: "What is X?".to_string(),
                retrieved: context.iter().map(|c| c.to_string()).collect(),
                scored: None,
                context: context.iter().map(|c| c.to_string()).collect(),
                prompt: String::new(),
                answer: answer.to_string(),
                retrieval_ms: 0,
                completion_ms: 0,
            },
            feedback: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_groundedness_is_mean_over_sentences() {
        let provider = Table::new(&[("X is a widget.", 1.0), ("It is blue.", 0.0), ("It hums.", 0.5)]);
        let record = record(&["X is a widget."], "X is a widget. It is blue. It hums.");

        let result = Feedback::groundedness().evaluate(&provider, &record).await.unwrap();
        assert_eq!(result.item_scores, vec![0.5]);
        assert_eq!(result.score, 0.5);
        assert!(result.reasons.is_empty());
    }

    #[tokio::test]
    async fn test_groundedness_of_empty_answer_is_zero() {
        let provider = Table::new(&[]);
        let record = record(&["X is a widget."], "   ");

        let result = Feedback::groundedness().evaluate(&provider, &record).await.unwrap();
        assert_eq!(result.item_scores, vec![0.0]);
        assert_eq!(result.score, 0.0);
    }

    #[tokio::test]
    async fn test_context_relevance_is_mean_over_passages() {
        let provider = Table::new(&[("X is a widget.", 0.9), ("Unrelated text.", 0.3)]);
        let record = record(&["X is a widget.", "Unrelated text."], "answer");

        let result = Feedback::context_relevance().evaluate(&provider, &record).await.unwrap();
        assert_eq!(result.item_scores, vec![0.9, 0.3]);
        assert!((result.score - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_context_relevance_without_contexts_is_zero() {
        let provider = Table::new(&[]);
        let record = record(&[], "answer");

        let result = Feedback::context_relevance().evaluate(&provider, &record).await.unwrap();
        assert!(result.item_scores.is_empty());
        assert_eq!(result.score, 0.0);
    }

    #[tokio::test]
    async fn test_answer_relevance_single_item() {
        let provider = Table::new(&[("X is a widget.", 2.0 / 3.0)]);
        let record = record(&[], "X is a widget.");

        let result = Feedback::answer_relevance().evaluate(&provider, &record).await.unwrap();
        assert_eq!(result.item_scores, vec![2.0 / 3.0]);
        assert_eq!(result.score, 2.0 / 3.0);
    }

    #[tokio::test]
    async fn test_groundedness_reasons_name_their_statement() {
        let mut provider = Table::new(&[("X is a widget.", 1.0)]);
        provider.reasons = true;
        let record = record(&["X is a widget."], "X is a widget. It is blue.");

        let result = Feedback::groundedness().evaluate(&provider, &record).await.unwrap();
        assert_eq!(
            result.reasons,
            vec!["X is a widget. -> rated 1", "It is blue. -> rated 0"]
        );
    }
}
