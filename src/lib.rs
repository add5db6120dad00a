//! cortexrag - Retrieval-augmented answers over Cortex Search
//!
//! Retrieves passages from a managed search service, optionally drops the
//! ones an LLM judge rates as irrelevant, and asks a hosted model to answer
//! from what is left.
//!
//! # Architecture
//!
//! - **session**: secrets and the authenticated platform session
//! - **search**: search service client + bounded retriever
//! - **completion**: hosted completion client + event-stream parser
//! - **rag**: prompt template, relevance filter, pipeline
//! - **feedback**: judge provider, feedback definitions, recorded apps

pub mod errors;

// Re-export commonly used types
pub use errors::{RagError, Result};

pub mod session;
pub mod search;
pub mod completion;
pub mod rag;
pub mod feedback;

// Wiring, CLI and diagnostics
pub mod bootstrap;
pub mod cli;
pub mod doctor;
pub mod telemetry;
