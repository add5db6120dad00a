//! Error types for cortexrag
//!
//! A single error enum shared by every stage of the pipeline. Stages never
//! wrap each other's errors, so a failure surfaces to the caller with the
//! variant the failing stage produced.

use thiserror::Error;

/// Main error type for retrieval, generation and evaluation
#[derive(Error, Debug)]
pub enum RagError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A required secret was not provided
    #[error("Missing secret: {0} is not set")]
    MissingSecret(String),

    /// Login or token errors
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Search service errors
    #[error("Search service error (HTTP {status}): {message}")]
    SearchError { status: u16, message: String },

    /// Completion service errors
    #[error("Completion service error (HTTP {status}): {message}")]
    CompletionError { status: u16, message: String },

    /// A search hit did not carry the requested text column
    #[error("Search result is missing text field '{field}'")]
    MissingField { field: String },

    /// Relevance / groundedness scoring errors
    #[error("Scoring error: {0}")]
    ScoringError(String),

    /// Event stream parsing errors
    #[error("Stream parse error: {0}")]
    StreamParseError(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic errors with context
    #[error("Error: {0}")]
    Generic(String),
}

/// Result type alias for cortexrag operations
pub type Result<T> = std::result::Result<T, RagError>;

/// Convert anyhow errors to RagError
impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Generic(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RagError::SearchError {
            status: 404,
            message: "service not found".to_string(),
        };
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("service not found"));
    }

    #[test]
    fn test_missing_secret_names_variable() {
        let err = RagError::MissingSecret("SNOWFLAKE_ROLE".to_string());
        assert!(err.to_string().contains("SNOWFLAKE_ROLE"));
    }

    #[test]
    fn test_from_anyhow() {
        let err: RagError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, RagError::Generic(ref m) if m == "boom"));
    }
}
