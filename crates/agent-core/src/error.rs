//! Error types for agent-core

use thiserror::Error;

/// Result type alias for agent-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for run-state and node operations
#[derive(Error, Debug)]
pub enum Error {
    /// Generic error message
    #[error("{0}")]
    Generic(String),

    /// Unknown research mode
    #[error("Invalid mode '{0}'. Must be one of: pinecone, web_search, snowflake, combined")]
    InvalidMode(String),

    /// A graph node failed in a way it could not absorb
    #[error("Node '{node}' failed: {detail}")]
    NodeFailed { node: String, detail: String },
}
