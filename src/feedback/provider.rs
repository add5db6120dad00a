//! LLM-as-judge scoring provider
//!
//! Every metric asks the judge model for a rating on a 0-3 scale followed by
//! its reasoning. The rating is normalized to [0, 1]; the reasoning is kept.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::completion::CompletionService;
use crate::errors::{RagError, Result};

/// Highest rating the rubrics ask for
pub const MAX_RATING: f64 = 3.0;

/// A normalized score and the judge's reasoning for it
#[derive(Debug, Clone, PartialEq)]
pub struct Rating {
    pub score: f64,
    pub reason: Option<String>,
}

impl From<f64> for Rating {
    fn from(score: f64) -> Self {
        Self { score, reason: None }
    }
}

/// Scores used by the relevance filter and the evaluation feedbacks
///
/// The `*_with_reasons` variants default to the bare score; providers that
/// can explain their ratings override them.
#[async_trait]
pub trait FeedbackProvider: Send + Sync {
    /// How relevant a retrieved passage is to the question
    async fn context_relevance(&self, question: &str, context: &str) -> Result<f64>;

    /// How relevant the answer is to the question
    async fn answer_relevance(&self, question: &str, answer: &str) -> Result<f64>;

    /// How well one answer statement is supported by the source text
    async fn groundedness(&self, source: &str, statement: &str) -> Result<f64>;

    async fn context_relevance_with_reasons(&self, question: &str, context: &str) -> Result<Rating> {
        Ok(self.context_relevance(question, context).await?.into())
    }

    async fn answer_relevance_with_reasons(&self, question: &str, answer: &str) -> Result<Rating> {
        Ok(self.answer_relevance(question, answer).await?.into())
    }

    async fn groundedness_with_reasons(&self, source: &str, statement: &str) -> Result<Rating> {
        Ok(self.groundedness(source, statement).await?.into())
    }
}

const CONTEXT_RELEVANCE_RUBRIC: &str = "You are a RELEVANCE grader. Given a QUESTION and a CONTEXT, \
rate how relevant the CONTEXT is to answering the QUESTION on a scale from 0 to 3.
0 means the CONTEXT is unrelated. 1 means it touches the topic but does not help. \
2 means it answers part of the QUESTION. 3 means it answers the QUESTION fully.
Reply with the score first, then one short sentence of reasoning.";

const ANSWER_RELEVANCE_RUBRIC: &str = "You are a RELEVANCE grader. Given a QUESTION and an ANSWER, \
rate how well the ANSWER addresses the QUESTION on a scale from 0 to 3.
0 means the ANSWER is off topic. 3 means it is a complete and direct answer. \
An answer that says the information is unavailable scores 1 at most.
Reply with the score first, then one short sentence of reasoning.";

const GROUNDEDNESS_RUBRIC: &str = "You are an INFORMATION OVERLAP grader. Given a SOURCE and a STATEMENT, \
rate how strongly the SOURCE supports the STATEMENT on a scale from 0 to 3.
0 means no support or contradiction. 3 means the STATEMENT is stated or directly implied by the SOURCE.
Reply with the score first, then quote the supporting evidence.";

/// Judge backed by any completion service
#[derive(Clone)]
pub struct CortexJudge {
    completion: Arc<dyn CompletionService>,
    model: String,
}

impl CortexJudge {
    pub fn new(completion: Arc<dyn CompletionService>, model: &str) -> Self {
        Self {
            completion,
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn rate(&self, rubric: &str, body: String) -> Result<Rating> {
        let prompt = format!("{}\n\n{}\n\nSCORE:", rubric, body);
        let reply = self.completion.complete(&self.model, &prompt).await?;
        let rating = parse_reply(&reply, MAX_RATING)?;
        debug!(score = rating.score, reasoned = rating.reason.is_some(), "judge rating");
        Ok(rating)
    }
}

#[async_trait]
impl FeedbackProvider for CortexJudge {
    async fn context_relevance(&self, question: &str, context: &str) -> Result<f64> {
        Ok(self.context_relevance_with_reasons(question, context).await?.score)
    }

    async fn answer_relevance(&self, question: &str, answer: &str) -> Result<f64> {
        Ok(self.answer_relevance_with_reasons(question, answer).await?.score)
    }

    async fn groundedness(&self, source: &str, statement: &str) -> Result<f64> {
        Ok(self.groundedness_with_reasons(source, statement).await?.score)
    }

    async fn context_relevance_with_reasons(&self, question: &str, context: &str) -> Result<Rating> {
        self.rate(
            CONTEXT_RELEVANCE_RUBRIC,
            format!("QUESTION: {}\n\nCONTEXT: {}", question, context),
        )
        .await
    }

    async fn answer_relevance_with_reasons(&self, question: &str, answer: &str) -> Result<Rating> {
        self.rate(
            ANSWER_RELEVANCE_RUBRIC,
            format!("QUESTION: {}\n\nANSWER: {}", question, answer),
        )
        .await
    }

    async fn groundedness_with_reasons(&self, source: &str, statement: &str) -> Result<Rating> {
        self.rate(
            GROUNDEDNESS_RUBRIC,
            format!("SOURCE: {}\n\nSTATEMENT: {}", source, statement),
        )
        .await
    }
}

/// Byte spans of the numbers in `text` (digits with an optional decimal part)
fn number_spans(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
        spans.push((start, i));
    }
    spans
}

/// Whether the text right after a number continues a range like `0-3` or `0 to 3`
fn opens_range(after: &str) -> bool {
    let after = after.trim_start();
    let rest = after
        .strip_prefix('-')
        .or_else(|| after.strip_prefix('–'))
        .or_else(|| after.strip_prefix("to "));
    rest.map_or(false, |rest| {
        rest.trim_start().starts_with(|c: char| c.is_ascii_digit())
    })
}

/// Span of the rating: the first number after a `score` marker, else the
/// first number that is not part of a range
fn rating_span(reply: &str) -> Option<(usize, usize)> {
    let spans = number_spans(reply);

    if let Some(marker) = reply.to_ascii_lowercase().find("score") {
        if let Some(span) = spans.iter().find(|(start, _)| *start > marker) {
            return Some(*span);
        }
    }

    let mut skip_next = false;
    for &(start, end) in &spans {
        if skip_next {
            skip_next = false;
            continue;
        }
        if opens_range(&reply[end..]) {
            skip_next = true;
            continue;
        }
        return Some((start, end));
    }
    None
}

/// Parse a judge reply into a normalized score and the reasoning after it
pub fn parse_reply(reply: &str, max: f64) -> Result<Rating> {
    let (start, end) = rating_span(reply)
        .ok_or_else(|| RagError::ScoringError(format!("no rating in reply: {:?}", reply)))?;

    let digits = &reply[start..end];
    let value: f64 = digits
        .parse()
        .map_err(|_| RagError::ScoringError(format!("unreadable rating: {:?}", digits)))?;

    let reason = reply[end..]
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '.' | ':' | '-' | '–' | ')' | '/'))
        .trim();

    Ok(Rating {
        score: value.clamp(0.0, max) / max,
        reason: (!reason.is_empty()).then(|| reason.to_string()),
    })
}

/// Normalized score of a judge reply, clamped to [0, max] and scaled to [0, 1]
pub fn parse_rating(reply: &str, max: f64) -> Result<f64> {
    Ok(parse_reply(reply, max)?.score)
}
