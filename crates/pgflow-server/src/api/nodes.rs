//! Node listing and message injection

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use pgflow_core::Message;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::errors::ApiError;
use crate::server::PgflowServer;

/// List deployed nodes
pub async fn list_nodes(State(server): State<Arc<PgflowServer>>) -> impl IntoResponse {
    Json(server.runtime.nodes().await)
}

/// Deliver a message to a query node and return the message it emits
pub async fn inject_message(
    State(server): State<Arc<PgflowServer>>,
    Path(node_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let msg = Message::from_value(body)?;
    debug!(node_id = %node_id, "Injecting message");
    let out = server
        .runtime
        .inject(&node_id, msg, server.config.input_timeout())
        .await?;
    Ok(Json(out))
}
