//! PostgreSQL query dispatcher for pgflow
//!
//! This crate implements the [`QueryDispatch`](pgflow_core::QueryDispatch)
//! interface on top of sqlx: one lazily connected pool per configuration
//! node, named-parameter translation, parameters bound by their inferred
//! types, and row decoding into JSON.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod connection;
pub mod dispatcher;
pub mod named;
pub mod params;
pub mod registry;
pub mod rows;

pub use dispatcher::PgQueryDispatcher;
pub use registry::PoolRegistry;

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    10
}

/// Sizing and timeouts applied to every pool a dispatcher creates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Maximum number of physical connections per pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Timeout for acquiring a connection from the pool (in seconds)
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// How long an unused connection stays open (in seconds)
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl PoolSettings {
    /// Acquire timeout as a [`Duration`]
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Idle timeout as a [`Duration`]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}
