//! API module for the pgflow server
//!
//! This module contains the API routes and handlers.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod credentials;
pub mod errors;
pub mod health;
pub mod nodes;

use crate::server::PgflowServer;

/// Build the router for API endpoints
pub fn build_router(server: Arc<PgflowServer>) -> Router {
    Router::new()
        // Credential administration
        .route(
            "/postgresdb/:id",
            get(credentials::get_credentials)
                .post(credentials::update_credentials)
                .delete(credentials::delete_credentials),
        )
        // Nodes
        .route("/v1/nodes", get(nodes::list_nodes))
        .route("/v1/nodes/:id/input", post(nodes::inject_message))
        // Health check
        .route("/health", get(health::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}
