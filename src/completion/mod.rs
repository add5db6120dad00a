//! Completion client module
//!
//! Provides the hosted-model completion client and its event-stream parser.

pub mod client;
pub mod parser;

// Re-export commonly used types
pub use client::{CompletionService, CortexCompleteClient, COMPLETE_PATH};
pub use parser::{EventStreamParser, StreamEvent, MAX_BUFFER_SIZE};
