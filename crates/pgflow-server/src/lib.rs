//!
//! pgflow server - hosts a flow of Postgres nodes
//!
//! Deploys the configuration and query nodes of a flow file, serves the
//! credential administration endpoints, and accepts messages for query
//! nodes over HTTP.

use std::sync::Arc;

/// API module
pub mod api;

/// Configuration module
pub mod config;

/// Error module
pub mod error;

/// Flow file module
pub mod flow;

/// Node runtime module
pub mod runtime;

/// Server module
pub mod server;

// Re-export key types
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use flow::{FlowDefinition, NodeDefinition};
pub use runtime::{FlowRuntime, NodeSummary};
pub use server::PgflowServer;

/// Run function
///
/// Deploys the configured flow file, if any, and serves until Ctrl-C.
pub async fn run(config: ServerConfig) -> ServerResult<()> {
    init_logging(&config);

    let flow_file = config.flow_file.clone();
    let server = Arc::new(PgflowServer::new(config));

    if let Some(path) = flow_file {
        let flow = FlowDefinition::from_file(&path).await?;
        tracing::info!(flow_file = %path, nodes = flow.nodes.len(), "Deploying flow");
        server.runtime.deploy(flow).await?;
    } else {
        tracing::info!("No flow file configured, starting empty");
    }

    server.run(shutdown_signal()).await
}

/// Initialize logging
///
/// `RUST_LOG` wins over the configured level when set.
fn init_logging(config: &ServerConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    // Create filter based on config
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // A second init (tests, embedding) keeps the first subscriber
    let result = if config.log_json {
        fmt().json().with_env_filter(filter).with_target(true).try_init()
    } else {
        fmt().with_env_filter(filter).with_target(true).try_init()
    };
    if result.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(err) => tracing::error!(error = %err, "Cannot listen for shutdown signal"),
    }
}
