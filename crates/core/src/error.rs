//! Error types for citerag.
//!
//! A single error enum covers configuration, I/O, generation, prompt and
//! serialization failures, plus the retrieval taxonomy raised at the index
//! build/load boundary and at the hit normalization boundary.

use thiserror::Error;

/// Unified error type for citerag.
///
/// All fallible functions return `Result<T, AppError>`.
/// Library code never panics; errors are represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generation service errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Retrieval pipeline errors that do not fit a more specific variant
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// An index build was attempted over zero documents
    #[error("Cannot build an index over an empty corpus")]
    EmptyCorpus,

    /// No index snapshot exists at query time
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// A snapshot exists but failed structural validation
    #[error("Index corrupt: {0}")]
    IndexCorrupt(String),

    /// A retrieval hit could not be normalized into the canonical shape
    #[error("Malformed hit: {0}")]
    MalformedHit(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the error belongs to the index lifecycle (build or load) and
    /// should be handled there instead of failing a query.
    pub fn is_index_error(&self) -> bool {
        matches!(
            self,
            AppError::EmptyCorpus | AppError::IndexUnavailable(_) | AppError::IndexCorrupt(_)
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
