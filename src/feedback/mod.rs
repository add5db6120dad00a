//! Evaluation wiring
//!
//! Components:
//! - Provider: LLM-as-judge scoring (also used by the relevance filter)
//! - Definitions: groundedness, context relevance and answer relevance
//! - App: recorded pipelines, evaluation and the leaderboard

pub mod app;
pub mod definitions;
pub mod provider;

pub use app::{Leaderboard, LeaderboardRow, Record, RecordedApp};
pub use definitions::{default_feedbacks, Aggregation, Feedback, FeedbackKind, FeedbackResult, Selector};
pub use provider::{CortexJudge, FeedbackProvider, Rating};
