//! Document retrieval through a managed search service
//!
//! Components:
//! - Client: `SearchService` seam and the Cortex Search HTTP implementation
//! - Retriever: bounded top-k text extraction from search hits

pub mod client;
pub mod retriever;

pub use client::{CortexSearchClient, SearchRequest, SearchResponse, SearchService};
pub use retriever::Retriever;
