//! Memoized pools, one per configuration node

use pgflow_core::{ConfigNodeId, ConnectionDescriptor};
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::connection::create_pool;
use crate::PoolSettings;

struct PoolEntry {
    descriptor: ConnectionDescriptor,
    pool: PgPool,
}

/// Registry of pools keyed by configuration identity
///
/// A pool is created on first use and reused while the resolved descriptor
/// stays the same. When the descriptor changes (for example after a
/// credential update) the pool is replaced. The old pool is not closed
/// here: requests already holding or waiting on it finish there, and it
/// shuts down when the last of them drops its handle.
pub struct PoolRegistry {
    settings: PoolSettings,
    pools: Mutex<HashMap<ConfigNodeId, PoolEntry>>,
}

impl PoolRegistry {
    /// Create an empty registry
    pub fn new(settings: PoolSettings) -> Self {
        Self {
            settings,
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Settings applied to new pools
    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Return the pool for `descriptor`, creating or replacing it as needed
    pub async fn get_or_create(&self, descriptor: &ConnectionDescriptor) -> PgPool {
        let mut pools = self.pools.lock().await;

        if let Some(entry) = pools.get(&descriptor.id) {
            if entry.descriptor == *descriptor {
                return entry.pool.clone();
            }
        }

        let pool = create_pool(descriptor, &self.settings);
        let previous = pools.insert(
            descriptor.id.clone(),
            PoolEntry {
                descriptor: descriptor.clone(),
                pool: pool.clone(),
            },
        );
        drop(pools);

        if previous.is_some() {
            info!(config_id = %descriptor.id, "Connection settings changed, replacing pool");
        }
        pool
    }

    /// Number of pools currently held
    pub async fn len(&self) -> usize {
        self.pools.lock().await.len()
    }

    /// Whether no pool has been created yet
    pub async fn is_empty(&self) -> bool {
        self.pools.lock().await.is_empty()
    }

    /// Open physical connections in the pool for `id`, if one exists
    pub async fn pool_size(&self, id: &ConfigNodeId) -> Option<u32> {
        self.pools.lock().await.get(id).map(|entry| entry.pool.size())
    }

    /// Idle connections in the pool for `id`, if one exists
    pub async fn idle_count(&self, id: &ConfigNodeId) -> Option<usize> {
        self.pools.lock().await.get(id).map(|entry| entry.pool.num_idle())
    }

    /// Close and forget every pool
    pub async fn shutdown(&self) {
        let drained: Vec<(ConfigNodeId, PoolEntry)> = self.pools.lock().await.drain().collect();
        for (id, entry) in drained {
            debug!(config_id = %id, "Closing connection pool");
            entry.pool.close().await;
        }
    }
}
