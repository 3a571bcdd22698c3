//! Error types for research operations

use agent_llm::LLMError;
use agent_utils::EnvError;
use thiserror::Error;

/// Research assistant errors
#[derive(Debug, Error)]
pub enum ResearchError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request rejected before the graph runs; the message is shown verbatim
    #[error("{0}")]
    Validation(String),

    /// LLM call failed
    #[error("LLM error: {0}")]
    Llm(#[from] LLMError),

    /// A backend API answered with an error or an unexpected payload
    #[error("API error: {0}")]
    Api(String),

    /// Prompt template failed to render
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Report or price ingestion produced inconsistent data
    #[error("Ingest error: {0}")]
    Ingest(String),

    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type alias for research operations
pub type Result<T> = std::result::Result<T, ResearchError>;

impl From<minijinja::Error> for ResearchError {
    fn from(err: minijinja::Error) -> Self {
        ResearchError::Prompt(err.to_string())
    }
}

impl From<EnvError> for ResearchError {
    fn from(err: EnvError) -> Self {
        ResearchError::Config(err.to_string())
    }
}

/// Convert ResearchError to agent_core::Error
impl From<ResearchError> for agent_core::Error {
    fn from(err: ResearchError) -> Self {
        agent_core::Error::Generic(err.to_string())
    }
}

/// Convert agent_core::Error to ResearchError
impl From<agent_core::Error> for ResearchError {
    fn from(err: agent_core::Error) -> Self {
        match err {
            agent_core::Error::InvalidMode(_) => ResearchError::Validation(err.to_string()),
            other => ResearchError::Other(other.to_string()),
        }
    }
}

/// Convert anyhow::Error to ResearchError
impl From<anyhow::Error> for ResearchError {
    fn from(err: anyhow::Error) -> Self {
        ResearchError::Other(err.to_string())
    }
}
