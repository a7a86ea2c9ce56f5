use pgflow_core::{ConfigNodeId, ConfigRegistry, CoreError, DatabaseConfig};
use std::sync::Arc;
use tracing::info;

/// Node type name of the configuration node
pub const POSTGRESDB_NODE_TYPE: &str = "postgresdb";

/// The `postgresdb` configuration node
///
/// Holds the non-sensitive connection fields. Credentials live in the
/// credential store under the same identity and are read at query time.
pub struct PostgresDatabaseNode {
    config: DatabaseConfig,
    registry: Arc<dyn ConfigRegistry>,
}

impl PostgresDatabaseNode {
    /// Create the node and make it visible to query nodes
    pub async fn create(config: DatabaseConfig, registry: Arc<dyn ConfigRegistry>) -> Result<Self, CoreError> {
        registry.register(config.clone()).await?;
        info!(
            config_id = %config.id,
            hostname = %config.hostname,
            port = config.port,
            db = %config.db,
            "postgresdb node created"
        );
        Ok(Self { config, registry })
    }

    /// Identity of this node
    pub fn id(&self) -> &ConfigNodeId {
        &self.config.id
    }

    /// Connection fields
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Withdraw the node; query nodes resolving it afterwards will fail
    pub async fn close(&self) -> Result<(), CoreError> {
        self.registry.remove(&self.config.id).await
    }
}
