//! Error types for DocQA.
//!
//! A single error enum covers every failure category in the workspace. Each
//! variant is a distinct kind so callers can tell a misconfiguration apart from
//! an unavailable retrieval backend or a failed generation call. A refusal or a
//! partially verified answer is never an error; those are values on the chat
//! response.

use thiserror::Error;

/// Unified error type for DocQA.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (including invalid chunking parameters)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Retrieval collaborator or vector store failures
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// LLM provider (generation collaborator) errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Document extraction and ingestion errors
    #[error("Ingest error: {0}")]
    Ingest(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Stable, machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Retrieval(_) => "retrieval",
            AppError::Llm(_) => "llm",
            AppError::Ingest(_) => "ingest",
            AppError::Serialization(_) => "serialization",
            AppError::Other(_) => "other",
        }
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
