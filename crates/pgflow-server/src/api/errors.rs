//! Error handling for the pgflow server API
//!
//! This module contains standardized error handling for the API.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::error;

use crate::error::ServerError;

/// API Error type for returning standard error responses
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),
    /// Wrapped server error
    ServerError(ServerError),
}

impl From<ServerError> for ApiError {
    fn from(err: ServerError) -> Self {
        ApiError::ServerError(err)
    }
}

impl From<pgflow_core::CoreError> for ApiError {
    fn from(err: pgflow_core::CoreError) -> Self {
        ApiError::ServerError(err.into())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::ServerError(err) => write!(f, "Server Error: {}", err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "ERR_BAD_REQUEST".to_string(), msg),
            ApiError::ServerError(err) => server_error_parts(err),
        };

        if status.is_server_error() {
            error!(error_code = %error_code, "{}", message);
        }

        let body = Json(json!({
            "error": message,
            "errorDetails": {
                "errorCode": error_code,
                "errorMessage": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Status, error code and message for a [`ServerError`]
fn server_error_parts(err: ServerError) -> (StatusCode, String, String) {
    let message = err.to_string();
    match err {
        ServerError::NotFound(resource) => (
            StatusCode::NOT_FOUND,
            format!("ERR_NOT_FOUND_{}", resource.split_whitespace().next().unwrap_or("").to_uppercase()),
            message,
        ),
        ServerError::ValidationError(_) => (StatusCode::BAD_REQUEST, "ERR_VALIDATION_ERROR".to_string(), message),
        ServerError::FlowParsingError(_) => (StatusCode::BAD_REQUEST, "ERR_FLOW_PARSING_ERROR".to_string(), message),
        // The node's own error code is the most useful thing to hand back
        ServerError::CallerError(code) => (StatusCode::BAD_REQUEST, code, message),
        ServerError::NodeNotConfigured(_) => (StatusCode::CONFLICT, "ERR_NODE_NOT_CONFIGURED".to_string(), message),
        ServerError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "ERR_TIMEOUT".to_string(), message),
        ServerError::ConfigurationError(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERR_CONFIGURATION_ERROR".to_string(),
            message,
        ),
        ServerError::NodeError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ERR_NODE_ERROR".to_string(), message),
        ServerError::InternalError(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERR_INTERNAL_SERVER_ERROR".to_string(),
            message,
        ),
    }
}
