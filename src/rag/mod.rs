// Retrieval-augmented generation pipeline
//
// Components:
// - Prompt: instruction template with context and question slots
// - Filter: context-relevance gate over retrieved passages
// - Pipeline: retrieve -> (filter) -> prompt -> complete

pub mod prompt;
pub mod filter;
pub mod pipeline;

// Re-export key types
pub use prompt::PromptTemplate;
pub use filter::{ContextFilter, ScoredPassage, RELEVANCE_THRESHOLD};
pub use pipeline::{QueryTrace, RAGPipeline};
