//! Hosting deployed nodes
//!
//! The runtime owns the configuration registry, the credential store, and
//! every deployed node. Each query node gets its own dispatcher, so closing
//! a node closes exactly the pools it created.

use pgflow_core::{
    ConfigRegistry, ConfigurationResolver, CredentialService, CredentialStore,
    InMemoryConfigRegistry, InMemoryCredentialStore, Message, NodeEvent,
};
use pgflow_nodes::{
    BroadcastSink, PostgresDatabaseNode, PostgresNode, POSTGRESDB_NODE_TYPE, POSTGRES_NODE_TYPE,
};
use pgflow_postgres::{PgQueryDispatcher, PoolSettings};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::error::{ServerError, ServerResult};
use crate::flow::FlowDefinition;

/// Summary of a deployed node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    /// Node identity
    pub id: String,
    /// Node type
    #[serde(rename = "type")]
    pub node_type: &'static str,
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// For query nodes, whether the configuration node was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configured: Option<bool>,
}

/// Runtime hosting the nodes of one flow
pub struct FlowRuntime {
    registry: Arc<InMemoryConfigRegistry>,
    credential_store: Arc<InMemoryCredentialStore>,
    resolver: ConfigurationResolver,
    credentials: CredentialService,
    sink: BroadcastSink,
    pool_settings: PoolSettings,
    database_nodes: RwLock<BTreeMap<String, PostgresDatabaseNode>>,
    query_nodes: RwLock<BTreeMap<String, PostgresNode>>,
}

impl FlowRuntime {
    /// Create an empty runtime
    pub fn new(pool_settings: PoolSettings, event_buffer: usize) -> Self {
        let registry = Arc::new(InMemoryConfigRegistry::new());
        let credential_store = Arc::new(InMemoryCredentialStore::new());
        Self {
            resolver: ConfigurationResolver::new(registry.clone(), credential_store.clone()),
            credentials: CredentialService::new(credential_store.clone()),
            registry,
            credential_store,
            sink: BroadcastSink::new(event_buffer),
            pool_settings,
            database_nodes: RwLock::new(BTreeMap::new()),
            query_nodes: RwLock::new(BTreeMap::new()),
        }
    }

    /// Credential administration for the admin endpoints
    pub fn credentials(&self) -> &CredentialService {
        &self.credentials
    }

    /// Subscribe to node events
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.sink.subscribe()
    }

    /// Deploy a flow
    ///
    /// Credentials are seeded first, then configuration nodes, then query
    /// nodes, so query nodes see their configuration at construction.
    pub async fn deploy(&self, flow: FlowDefinition) -> ServerResult<()> {
        for (id, creds) in flow.credentials.iter() {
            self.credential_store.put(id, creds.clone()).await?;
            debug!(config_id = %id, "Seeded credentials");
        }

        for config in flow.database_nodes() {
            let node = PostgresDatabaseNode::create(config.clone(), self.registry.clone()).await?;
            self.database_nodes
                .write()
                .await
                .insert(config.id.as_str().to_string(), node);
        }

        for config in flow.query_nodes() {
            let dispatcher = Arc::new(PgQueryDispatcher::new(self.pool_settings.clone()));
            let node = PostgresNode::new(
                config.clone(),
                self.resolver.clone(),
                dispatcher,
                Arc::new(self.sink.clone()),
            )
            .await;
            if let Some(previous) = self.query_nodes.write().await.insert(config.id.clone(), node) {
                warn!(node_id = %config.id, "Replacing deployed node");
                previous.close().await;
            }
        }

        info!(
            database_nodes = self.database_nodes.read().await.len(),
            query_nodes = self.query_nodes.read().await.len(),
            "Flow deployed"
        );
        Ok(())
    }

    /// Every deployed node
    pub async fn nodes(&self) -> Vec<NodeSummary> {
        let mut nodes: Vec<NodeSummary> = self
            .database_nodes
            .read()
            .await
            .values()
            .map(|node| NodeSummary {
                id: node.id().to_string(),
                node_type: POSTGRESDB_NODE_TYPE,
                name: node.config().name.clone(),
                configured: None,
            })
            .collect();
        nodes.extend(self.query_nodes.read().await.values().map(|node| NodeSummary {
            id: node.id().to_string(),
            node_type: POSTGRES_NODE_TYPE,
            name: node.config().name.clone(),
            configured: Some(node.is_configured()),
        }));
        nodes
    }

    /// Number of deployed nodes
    pub async fn node_count(&self) -> usize {
        self.database_nodes.read().await.len() + self.query_nodes.read().await.len()
    }

    /// Deliver a message to a query node and wait for what it emits
    ///
    /// Returns the outbound message. A message the node rejects comes back
    /// as [`ServerError::CallerError`] with the node's error code.
    pub async fn inject(&self, node_id: &str, mut msg: Message, timeout: Duration) -> ServerResult<Message> {
        let node = self
            .query_nodes
            .read()
            .await
            .get(node_id)
            .cloned()
            .ok_or_else(|| ServerError::NotFound(format!("Node {}", node_id)))?;
        if !node.is_configured() {
            return Err(ServerError::NodeNotConfigured(node_id.to_string()));
        }

        let msg_id = msg.ensure_msg_id();
        // Subscribe before sending so the reply cannot be missed
        let mut events = self.sink.subscribe();
        let _ = node.receive(msg);

        let wait = async {
            loop {
                match events.recv().await {
                    Ok(event) if event.node_id() == node_id && event.msg_id() == Some(msg_id.as_str()) => {
                        match event {
                            NodeEvent::Send { msg, .. } => return Ok(msg),
                            NodeEvent::Error { error, .. } => return Err(ServerError::CallerError(error)),
                            NodeEvent::Status { .. } => continue,
                        }
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event subscriber lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(ServerError::InternalError("event channel closed".to_string()))
                    }
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ServerError::Timeout(format!("message {} on node {}", msg_id, node_id)))?
    }

    /// Close every node and forget the flow
    pub async fn shutdown(&self) {
        let query_nodes: Vec<PostgresNode> = std::mem::take(&mut *self.query_nodes.write().await)
            .into_values()
            .collect();
        for node in query_nodes {
            node.close().await;
        }

        let database_nodes = std::mem::take(&mut *self.database_nodes.write().await);
        for (id, node) in database_nodes {
            if let Err(err) = node.close().await {
                warn!(config_id = %id, error = %err, "Failed to close postgresdb node");
            }
        }
        info!("All nodes closed");
    }

    /// Whether a configuration node is registered under `id`
    pub async fn has_database_node(&self, id: &str) -> bool {
        matches!(self.registry.get(&id.into()).await, Ok(Some(_)))
    }
}
