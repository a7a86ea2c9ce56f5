//! Flow files
//!
//! A flow file is YAML listing the nodes to deploy and, optionally, the
//! credentials to seed for configuration nodes.

use pgflow_core::{ConfigNodeId, Credentials, DatabaseConfig};
use pgflow_nodes::PostgresNodeConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::error::{ServerError, ServerResult};

/// One node in a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeDefinition {
    /// `postgresdb` configuration node
    #[serde(rename = "postgresdb")]
    PostgresDb(DatabaseConfig),
    /// `postgres` query node
    #[serde(rename = "postgres")]
    Postgres(PostgresNodeConfig),
}

impl NodeDefinition {
    /// Node identity
    pub fn id(&self) -> &str {
        match self {
            NodeDefinition::PostgresDb(config) => config.id.as_str(),
            NodeDefinition::Postgres(config) => &config.id,
        }
    }
}

/// A deployable set of nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    /// Nodes, in any order
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,

    /// Credentials to store before the nodes start, keyed by node identity
    #[serde(default)]
    pub credentials: BTreeMap<ConfigNodeId, Credentials>,
}

impl FlowDefinition {
    /// Parse and validate a flow from YAML
    pub fn from_yaml(yaml: &str) -> ServerResult<Self> {
        let flow: FlowDefinition = serde_yaml::from_str(yaml)?;
        flow.validate()?;
        Ok(flow)
    }

    /// Read a flow file
    pub async fn from_file(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let yaml = tokio::fs::read_to_string(path).await.map_err(|e| {
            ServerError::ConfigurationError(format!("Cannot read flow file {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&yaml)
    }

    /// Configuration nodes in the flow
    pub fn database_nodes(&self) -> impl Iterator<Item = &DatabaseConfig> {
        self.nodes.iter().filter_map(|node| match node {
            NodeDefinition::PostgresDb(config) => Some(config),
            NodeDefinition::Postgres(_) => None,
        })
    }

    /// Query nodes in the flow
    pub fn query_nodes(&self) -> impl Iterator<Item = &PostgresNodeConfig> {
        self.nodes.iter().filter_map(|node| match node {
            NodeDefinition::Postgres(config) => Some(config),
            NodeDefinition::PostgresDb(_) => None,
        })
    }

    /// Check that node identities are unique
    ///
    /// A query node may reference a configuration node that is not in the
    /// flow; it will report `missing postgres configuration` when started.
    pub fn validate(&self) -> ServerResult<()> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.id().is_empty() {
                return Err(ServerError::ValidationError("node id must not be empty".to_string()));
            }
            if !seen.insert(node.id()) {
                return Err(ServerError::ValidationError(format!("duplicate node id {}", node.id())));
            }
        }
        Ok(())
    }
}
