//! Storage traits for configuration nodes and their credentials
//!
//! The host owns configuration and credential state; pgflow only reads it
//! through these traits, so any persistence mechanism can be plugged in.

use async_trait::async_trait;

use super::descriptor::{ConfigNodeId, Credentials, DatabaseConfig};
use crate::CoreError;

/// Registry of `postgresdb` configuration nodes
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ConfigRegistry: Send + Sync {
    /// Find a configuration node by ID
    async fn get(&self, id: &ConfigNodeId) -> Result<Option<DatabaseConfig>, CoreError>;

    /// Register or replace a configuration node
    async fn register(&self, config: DatabaseConfig) -> Result<(), CoreError>;

    /// Remove a configuration node
    async fn remove(&self, id: &ConfigNodeId) -> Result<(), CoreError>;
}

/// Store of credentials, keyed by configuration node identity
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Get the stored credentials, if any
    async fn get(&self, id: &ConfigNodeId) -> Result<Option<Credentials>, CoreError>;

    /// Replace the stored credentials
    async fn put(&self, id: &ConfigNodeId, credentials: Credentials) -> Result<(), CoreError>;

    /// Delete the stored credentials; succeeds whether or not any existed
    async fn delete(&self, id: &ConfigNodeId) -> Result<(), CoreError>;
}
