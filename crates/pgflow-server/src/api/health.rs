//! Health check endpoint

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::server::PgflowServer;

/// Health check handler
///
/// Reports the server as up together with the number of deployed nodes.
/// Database reachability is not checked here; a query node reports that
/// through its own status.
pub async fn health_check(State(server): State<Arc<PgflowServer>>) -> impl IntoResponse {
    debug!("Health check requested");

    Json(json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION"),
        "nodes": server.runtime.node_count().await,
    }))
}
