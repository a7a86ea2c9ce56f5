//! Error types for the pgflow server
//!
//! This module contains the error types used throughout the server.

use pgflow_core::CoreError;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Flow file could not be parsed
    #[error("Flow parsing error: {0}")]
    FlowParsingError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A node rejected a message; carries the node's error code
    #[error("{0}")]
    CallerError(String),

    /// The node exists but cannot process input
    #[error("Node {0} is not configured")]
    NodeNotConfigured(String),

    /// A message did not complete in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Error from the node layer
    #[error("Node error: {0}")]
    NodeError(CoreError),

    /// Internal server error
    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

impl From<CoreError> for ServerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::CallerError(code) => ServerError::CallerError(code),
            CoreError::SerializationError(msg) => ServerError::ValidationError(msg),
            other => ServerError::NodeError(other),
        }
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::ValidationError(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for ServerError {
    fn from(err: serde_yaml::Error) -> Self {
        ServerError::FlowParsingError(format!("YAML error: {}", err))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::InternalError(format!("IO error: {}", err))
    }
}
