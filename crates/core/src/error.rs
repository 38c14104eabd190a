//! Error types for the adaptive RAG assistant.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, I/O, language model, knowledge,
//! prompt, workflow, and conversation history errors.

use thiserror::Error;

/// Unified error type for the adaptive RAG assistant.
///
/// All functions in the application return `Result<T, AppError>`.
/// We never panic, errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Language model transport and protocol errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Evidence store, embedding, and indexing errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// A workflow node could not obtain a usable model answer.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// An external retrieval source (web search) failed.
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// Conversation persistence errors
    #[error("History error: {0}")]
    History(String),

    /// Lookup misses (unknown conversation id, missing file, ...)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Ingestion of a document type we cannot parse
    #[error("Unsupported document: {0}")]
    UnsupportedDocument(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Re-label model-side failures raised inside a workflow node as
    /// generation failures. Other variants pass through untouched.
    pub fn into_generation(self) -> Self {
        match self {
            AppError::Llm(msg) | AppError::Prompt(msg) | AppError::Serialization(msg) => {
                AppError::Generation(msg)
            }
            other => other,
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
