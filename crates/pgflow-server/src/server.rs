//! HTTP server hosting a flow runtime

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::runtime::FlowRuntime;

/// Main server implementation
pub struct PgflowServer {
    /// Configuration
    pub config: ServerConfig,

    /// Deployed nodes
    pub runtime: Arc<FlowRuntime>,
}

impl std::fmt::Debug for PgflowServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgflowServer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PgflowServer {
    /// Create a server with an empty runtime
    pub fn new(config: ServerConfig) -> Self {
        let runtime = Arc::new(FlowRuntime::new(config.pool.clone(), config.event_buffer));
        Self { config, runtime }
    }

    /// Address the server binds to
    pub fn address(&self) -> ServerResult<SocketAddr> {
        let ip: IpAddr = self.config.bind_address.parse().map_err(|e| {
            ServerError::ConfigurationError(format!("Invalid bind address {}: {}", self.config.bind_address, e))
        })?;
        Ok(SocketAddr::new(ip, self.config.port))
    }

    /// Serve until `shutdown` resolves, then close every node
    pub async fn run<F>(self: Arc<Self>, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Starting pgflow server");

        let app = crate::api::build_router(self.clone());

        let listener = TcpListener::bind(self.address()?).await?;
        let addr = listener.local_addr()?;
        info!("Listening on {}", addr);

        axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

        info!("HTTP server stopped, closing nodes");
        self.runtime.shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address() {
        let server = PgflowServer::new(ServerConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            ..ServerConfig::default()
        });
        assert_eq!(server.address().unwrap(), "127.0.0.1:8080".parse().unwrap());

        let server = PgflowServer::new(ServerConfig {
            bind_address: "not an address".to_string(),
            ..ServerConfig::default()
        });
        assert!(matches!(server.address(), Err(ServerError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let server = Arc::new(PgflowServer::new(ServerConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            ..ServerConfig::default()
        }));
        server.clone().run(async {}).await.unwrap();
        assert_eq!(server.runtime.node_count().await, 0);
    }
}
