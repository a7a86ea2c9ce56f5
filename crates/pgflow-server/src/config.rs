//! Configuration for the pgflow server
//!
//! This module contains the configuration types and loading functionality.

use pgflow_postgres::PoolSettings;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{ServerError, ServerResult};

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub bind_address: String,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Flow file to deploy at startup
    #[serde(default)]
    pub flow_file: Option<String>,

    /// Settings for every connection pool
    #[serde(default)]
    pub pool: PoolSettings,

    /// Node events buffered per subscriber
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// How long an injected message may take before the request gives up
    #[serde(default = "default_input_timeout_secs")]
    pub input_timeout_secs: u64,
}

fn default_port() -> u16 {
    1880
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_event_buffer() -> usize {
    256
}

fn default_input_timeout_secs() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_host(),
            log_level: default_log_level(),
            log_json: false,
            flow_file: None,
            pool: PoolSettings::default(),
            event_buffer: default_event_buffer(),
            input_timeout_secs: default_input_timeout_secs(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, target: &mut T) {
    if let Ok(raw) = env::var(name) {
        match raw.parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => warn!("Invalid {} value: {}", name, raw),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn load() -> ServerResult<Self> {
        let mut config = Self::default();

        parse_env("SERVER_PORT", &mut config.port);

        if let Ok(host) = env::var("SERVER_HOST") {
            config.bind_address = host;
        }

        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.log_level = log_level;
        }

        if let Ok(format) = env::var("LOG_FORMAT") {
            config.log_json = format.eq_ignore_ascii_case("json");
        }

        if let Ok(flow_file) = env::var("FLOW_FILE") {
            if !flow_file.is_empty() {
                config.flow_file = Some(flow_file);
            }
        }

        parse_env("PG_POOL_MAX_CONNECTIONS", &mut config.pool.max_connections);
        parse_env("PG_POOL_ACQUIRE_TIMEOUT_SECS", &mut config.pool.acquire_timeout_secs);
        parse_env("PG_POOL_IDLE_TIMEOUT_SECS", &mut config.pool.idle_timeout_secs);
        parse_env("EVENT_BUFFER", &mut config.event_buffer);
        parse_env("INPUT_TIMEOUT_SECS", &mut config.input_timeout_secs);

        config.validate()?;
        info!(
            port = config.port,
            flow_file = config.flow_file.as_deref().unwrap_or("<none>"),
            max_connections = config.pool.max_connections,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> ServerResult<()> {
        if self.pool.max_connections == 0 {
            return Err(ServerError::ConfigurationError(
                "PG_POOL_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(ServerError::ConfigurationError(
                "EVENT_BUFFER must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Input timeout as a [`Duration`]
    pub fn input_timeout(&self) -> Duration {
        Duration::from_secs(self.input_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 1880);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.pool.max_connections, 10);
        assert_eq!(config.input_timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_pool() {
        let mut config = ServerConfig::default();
        config.pool.max_connections = 0;
        assert!(matches!(config.validate(), Err(ServerError::ConfigurationError(_))));
    }

    #[test]
    fn test_parse_env_keeps_value_on_garbage() {
        let mut port = 1880u16;
        std::env::set_var("PGFLOW_TEST_PORT_GARBAGE", "not-a-port");
        parse_env("PGFLOW_TEST_PORT_GARBAGE", &mut port);
        assert_eq!(port, 1880);

        std::env::set_var("PGFLOW_TEST_PORT_GOOD", "9000");
        parse_env("PGFLOW_TEST_PORT_GOOD", &mut port);
        assert_eq!(port, 9000);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: ServerConfig = serde_json::from_str(r#"{"port": 3000, "pool": {"max_connections": 4}}"#).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.pool.max_connections, 4);
        assert_eq!(config.pool.acquire_timeout_secs, 30);
        assert_eq!(config.event_buffer, 256);
    }
}
