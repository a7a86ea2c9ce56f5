//! In-memory implementations of the storage traits
//!
//! Used by the flow host and in tests. Nothing here survives a restart.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::descriptor::{ConfigNodeId, Credentials, DatabaseConfig};
use crate::domain::repository::{ConfigRegistry, CredentialStore};
use crate::CoreError;

/// In-memory registry of configuration nodes
#[derive(Debug, Default, Clone)]
pub struct InMemoryConfigRegistry {
    configs: Arc<RwLock<HashMap<ConfigNodeId, DatabaseConfig>>>,
}

impl InMemoryConfigRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// IDs of every registered configuration node
    pub async fn ids(&self) -> Vec<ConfigNodeId> {
        let mut ids: Vec<_> = self.configs.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl ConfigRegistry for InMemoryConfigRegistry {
    async fn get(&self, id: &ConfigNodeId) -> Result<Option<DatabaseConfig>, CoreError> {
        Ok(self.configs.read().await.get(id).cloned())
    }

    async fn register(&self, config: DatabaseConfig) -> Result<(), CoreError> {
        debug!(config_id = %config.id, hostname = %config.hostname, "Registering postgresdb node");
        self.configs.write().await.insert(config.id.clone(), config);
        Ok(())
    }

    async fn remove(&self, id: &ConfigNodeId) -> Result<(), CoreError> {
        self.configs.write().await.remove(id);
        Ok(())
    }
}

/// In-memory credential store
#[derive(Default, Clone)]
pub struct InMemoryCredentialStore {
    credentials: Arc<RwLock<HashMap<ConfigNodeId, Credentials>>>,
}

impl InMemoryCredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, id: &ConfigNodeId) -> Result<Option<Credentials>, CoreError> {
        Ok(self.credentials.read().await.get(id).cloned())
    }

    async fn put(&self, id: &ConfigNodeId, credentials: Credentials) -> Result<(), CoreError> {
        self.credentials.write().await.insert(id.clone(), credentials);
        Ok(())
    }

    async fn delete(&self, id: &ConfigNodeId) -> Result<(), CoreError> {
        let removed = self.credentials.write().await.remove(id).is_some();
        debug!(config_id = %id, removed, "Deleted credentials");
        Ok(())
    }
}
