//! Configuration resolution
//!
//! Turns a configuration node identity into a [`ConnectionDescriptor`] by
//! combining the node's connection fields with whatever credentials are
//! currently stored for it.

use std::sync::Arc;
use tracing::debug;

use crate::domain::descriptor::{ConfigNodeId, ConnectionDescriptor};
use crate::domain::repository::{ConfigRegistry, CredentialStore};
use crate::CoreError;

/// Resolves connection descriptors from live configuration and credentials
#[derive(Clone)]
pub struct ConfigurationResolver {
    configs: Arc<dyn ConfigRegistry>,
    credentials: Arc<dyn CredentialStore>,
}

impl ConfigurationResolver {
    /// Create a resolver over the given registry and credential store
    pub fn new(configs: Arc<dyn ConfigRegistry>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { configs, credentials }
    }

    /// Whether a configuration node is registered under `id`
    pub async fn exists(&self, id: &ConfigNodeId) -> Result<bool, CoreError> {
        Ok(self.configs.get(id).await?.is_some())
    }

    /// Resolve the descriptor for `id`
    ///
    /// Credentials are read on every call, so administrative updates are
    /// visible without a restart. Missing credentials are not an error here.
    pub async fn resolve(&self, id: &ConfigNodeId) -> Result<ConnectionDescriptor, CoreError> {
        let config = self
            .configs
            .get(id)
            .await?
            .ok_or_else(|| CoreError::ConfigurationMissing(format!("no postgresdb node with id {}", id)))?;

        let host = config.hostname.trim();
        if host.is_empty() {
            return Err(CoreError::ConfigurationIncomplete(format!(
                "postgresdb node {} has no hostname",
                id
            )));
        }
        let database = config.db.trim();
        if database.is_empty() {
            return Err(CoreError::ConfigurationIncomplete(format!(
                "postgresdb node {} has no database name",
                id
            )));
        }

        let credentials = self.credentials.get(id).await?.unwrap_or_default();
        debug!(config_id = %id, host, port = config.port, has_user = credentials.user.is_some(), "Resolved connection descriptor");

        Ok(ConnectionDescriptor {
            id: id.clone(),
            host: host.to_string(),
            port: config.port,
            database: database.to_string(),
            use_tls: config.ssl,
            user: credentials.user,
            password: credentials.password,
        })
    }
}
