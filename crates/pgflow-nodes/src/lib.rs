//!
//! Postgres nodes for pgflow
//!

pub mod components;
pub mod sink;

pub use components::{
    PostgresDatabaseNode, PostgresNode, PostgresNodeConfig, MISSING_CONFIGURATION,
    POSTGRESDB_NODE_TYPE, POSTGRES_NODE_TYPE,
};
pub use sink::BroadcastSink;
