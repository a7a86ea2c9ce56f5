use pgflow_core::{
    ConfigNodeId, ConfigurationResolver, CoreError, Message, MessageSink, NodeStatus, Outcome,
    QueryDispatch, QueryRequest,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Node type name of the query node
pub const POSTGRES_NODE_TYPE: &str = "postgres";

/// Error raised once when the referenced configuration node does not exist
pub const MISSING_CONFIGURATION: &str = "missing postgres configuration";

/// Deployed settings of a `postgres` query node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresNodeConfig {
    /// Node identity
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Identity of the `postgresdb` node to run against
    pub postgresdb: ConfigNodeId,
    /// Editor topic; carried but not applied to messages
    #[serde(default)]
    pub topic: Option<String>,
    /// Editor SQL text; carried but the payload always wins
    #[serde(default)]
    pub sqlquery: Option<String>,
}

struct Inner {
    config: PostgresNodeConfig,
    resolver: ConfigurationResolver,
    dispatcher: Arc<dyn QueryDispatch>,
    sink: Arc<dyn MessageSink>,
    configured: bool,
}

/// The `postgres` query node
///
/// Runs the SQL text in `msg.payload` against the configured database and
/// forwards the message with the rows (or an empty payload on failure).
#[derive(Clone)]
pub struct PostgresNode {
    inner: Arc<Inner>,
}

impl PostgresNode {
    /// Build the node
    ///
    /// When the configuration node cannot be found the error is reported
    /// once through the sink and the node ignores all input.
    pub async fn new(
        config: PostgresNodeConfig,
        resolver: ConfigurationResolver,
        dispatcher: Arc<dyn QueryDispatch>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        let configured = match resolver.exists(&config.postgresdb).await {
            Ok(found) => found,
            Err(err) => {
                warn!(node_id = %config.id, error = %err, "Could not look up postgres configuration");
                false
            }
        };
        if !configured {
            error!(node_id = %config.id, postgresdb = %config.postgresdb, "{}", MISSING_CONFIGURATION);
            sink.error(&config.id, MISSING_CONFIGURATION, None);
        }

        Self {
            inner: Arc::new(Inner {
                config,
                resolver,
                dispatcher,
                sink,
                configured,
            }),
        }
    }

    /// Node identity
    pub fn id(&self) -> &str {
        &self.inner.config.id
    }

    /// Deployed settings
    pub fn config(&self) -> &PostgresNodeConfig {
        &self.inner.config
    }

    /// Whether the configuration node was found at construction
    pub fn is_configured(&self) -> bool {
        self.inner.configured
    }

    /// Accept a message without waiting for it to be processed
    pub fn receive(&self, msg: Message) -> JoinHandle<()> {
        let node = self.clone();
        tokio::spawn(async move { node.handle_input(msg).await })
    }

    /// Process one message to completion
    pub async fn handle_input(&self, mut msg: Message) {
        let inner = &self.inner;
        if !inner.configured {
            debug!(node_id = %inner.config.id, "Ignoring input, node has no configuration");
            return;
        }

        let request = match QueryRequest::from_message(&msg) {
            Ok(request) => request,
            Err(CoreError::CallerError(code)) => {
                error!(node_id = %inner.config.id, "{}", code);
                inner.sink.error(&inner.config.id, &code, Some(msg));
                return;
            }
            Err(err) => {
                self.fail(msg, &err.to_string());
                return;
            }
        };

        let descriptor = match inner.resolver.resolve(&inner.config.postgresdb).await {
            Ok(descriptor) => descriptor,
            Err(err) => {
                self.fail(msg, &err.to_string());
                return;
            }
        };

        match inner.dispatcher.execute(&descriptor, request).await {
            Outcome::Success { rows } => {
                debug!(node_id = %inner.config.id, rows = rows.len(), "Query succeeded");
                msg.set_payload(Value::Array(rows.into_iter().map(Value::Object).collect()));
                msg.set_status("success");
                inner.sink.status(&inner.config.id, NodeStatus::success());
                inner.sink.send(&inner.config.id, msg);
            }
            Outcome::Failure { message } => self.fail(msg, &message),
        }
    }

    fn fail(&self, mut msg: Message, message: &str) {
        let inner = &self.inner;
        warn!(node_id = %inner.config.id, error = message, "Query failed");
        msg.set_payload("");
        msg.set_status("error");
        inner.sink.send(&inner.config.id, msg);
        inner.sink.status(&inner.config.id, NodeStatus::error(message));
    }

    /// Shut the node down, closing every pool its dispatcher owns
    pub async fn close(&self) {
        debug!(node_id = %self.inner.config.id, "Closing postgres node");
        self.inner.dispatcher.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgflow_core::{
        ConfigRegistry, DatabaseConfig, InMemoryConfigRegistry, InMemoryCredentialStore,
        MockMessageSink, MockQueryDispatch, QueryParameters, StatusFill, StatusShape,
        PAYLOAD_ERROR_CODE,
    };
    use serde_json::{json, Map};

    fn node_config() -> PostgresNodeConfig {
        PostgresNodeConfig {
            id: "q1".into(),
            name: Some("lookup".into()),
            postgresdb: "db".into(),
            topic: None,
            sqlquery: None,
        }
    }

    async fn resolver(with_config: bool) -> ConfigurationResolver {
        let registry = Arc::new(InMemoryConfigRegistry::new());
        if with_config {
            registry
                .register(DatabaseConfig {
                    id: "db".into(),
                    name: None,
                    hostname: "localhost".into(),
                    port: 5432,
                    db: "app".into(),
                    ssl: false,
                })
                .await
                .unwrap();
        }
        ConfigurationResolver::new(registry, Arc::new(InMemoryCredentialStore::new()))
    }

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_missing_configuration_reported_once_and_node_inert() {
        let mut sink = MockMessageSink::new();
        sink.expect_error()
            .withf(|id, error, msg| id == "q1" && error == MISSING_CONFIGURATION && msg.is_none())
            .times(1)
            .return_const(());
        sink.expect_send().never();
        sink.expect_status().never();

        let mut dispatcher = MockQueryDispatch::new();
        dispatcher.expect_execute().never();

        let node = PostgresNode::new(node_config(), resolver(false).await, Arc::new(dispatcher), Arc::new(sink)).await;
        assert!(!node.is_configured());
        node.handle_input(Message::with_payload("SELECT 1")).await;
    }

    #[tokio::test]
    async fn test_success_forwards_rows_and_keeps_other_properties() {
        let mut dispatcher = MockQueryDispatch::new();
        dispatcher
            .expect_execute()
            .withf(|descriptor, request| {
                descriptor.id.as_str() == "db"
                    && request.sql_text == "SELECT 1 AS one"
                    && request.parameters == QueryParameters::default()
            })
            .times(1)
            .returning(|_, _| Outcome::Success {
                rows: vec![row(json!({"one": 1}))],
            });

        let mut sink = MockMessageSink::new();
        sink.expect_status()
            .withf(|id, status| id == "q1" && *status == NodeStatus::success())
            .times(1)
            .return_const(());
        sink.expect_send()
            .withf(|id, msg| {
                id == "q1"
                    && msg.payload() == Some(&json!([{"one": 1}]))
                    && msg.status() == Some("success")
                    && msg.get("topic") == Some(&json!("orders"))
            })
            .times(1)
            .return_const(());
        sink.expect_error().never();

        let node = PostgresNode::new(node_config(), resolver(true).await, Arc::new(dispatcher), Arc::new(sink)).await;
        let msg = Message::from_value(json!({"payload": "SELECT 1 AS one", "topic": "orders"})).unwrap();
        node.handle_input(msg).await;
    }

    #[tokio::test]
    async fn test_failure_clears_payload_and_shows_red_ring() {
        let mut dispatcher = MockQueryDispatch::new();
        dispatcher.expect_execute().times(1).returning(|_, _| Outcome::Failure {
            message: "relation \"nonexistent_table\" does not exist".into(),
        });

        let mut sink = MockMessageSink::new();
        sink.expect_send()
            .withf(|_, msg| msg.payload() == Some(&json!("")) && msg.status() == Some("error"))
            .times(1)
            .return_const(());
        sink.expect_status()
            .withf(|_, status| {
                status.fill == StatusFill::Red
                    && status.shape == StatusShape::Ring
                    && status.text == "error: relation \"nonexistent_table\" does not exist"
            })
            .times(1)
            .return_const(());

        let node = PostgresNode::new(node_config(), resolver(true).await, Arc::new(dispatcher), Arc::new(sink)).await;
        node.handle_input(Message::with_payload("SELECT * FROM nonexistent_table")).await;
    }

    #[tokio::test]
    async fn test_missing_payload_is_a_caller_error() {
        let mut dispatcher = MockQueryDispatch::new();
        dispatcher.expect_execute().never();

        let mut sink = MockMessageSink::new();
        sink.expect_error()
            .withf(|id, error, msg| id == "q1" && error == PAYLOAD_ERROR_CODE && msg.is_some())
            .times(1)
            .return_const(());
        sink.expect_send().never();
        sink.expect_status().never();

        let node = PostgresNode::new(node_config(), resolver(true).await, Arc::new(dispatcher), Arc::new(sink)).await;
        node.handle_input(Message::from_value(json!({"topic": "x"})).unwrap()).await;
    }

    #[tokio::test]
    async fn test_non_string_payload_is_a_failure_without_dispatch() {
        let mut dispatcher = MockQueryDispatch::new();
        dispatcher.expect_execute().never();

        let mut sink = MockMessageSink::new();
        sink.expect_send()
            .withf(|_, msg| msg.status() == Some("error"))
            .times(1)
            .return_const(());
        sink.expect_status().times(1).return_const(());

        let node = PostgresNode::new(node_config(), resolver(true).await, Arc::new(dispatcher), Arc::new(sink)).await;
        node.handle_input(Message::with_payload(42)).await;
    }

    #[tokio::test]
    async fn test_configuration_removed_after_deploy_is_a_failure() {
        let registry = Arc::new(InMemoryConfigRegistry::new());
        registry
            .register(DatabaseConfig {
                id: "db".into(),
                name: None,
                hostname: "localhost".into(),
                port: 5432,
                db: "app".into(),
                ssl: false,
            })
            .await
            .unwrap();
        let resolver = ConfigurationResolver::new(registry.clone(), Arc::new(InMemoryCredentialStore::new()));

        let mut dispatcher = MockQueryDispatch::new();
        dispatcher.expect_execute().never();
        let mut sink = MockMessageSink::new();
        sink.expect_send()
            .withf(|_, msg| msg.status() == Some("error"))
            .times(1)
            .return_const(());
        sink.expect_status()
            .withf(|_, status| status.text.starts_with("error: Configuration missing"))
            .times(1)
            .return_const(());

        let node = PostgresNode::new(node_config(), resolver, Arc::new(dispatcher), Arc::new(sink)).await;
        registry.remove(&"db".into()).await.unwrap();
        node.handle_input(Message::with_payload("SELECT 1")).await;
    }

    #[tokio::test]
    async fn test_receive_runs_in_background_and_close_shuts_down() {
        let mut dispatcher = MockQueryDispatch::new();
        dispatcher
            .expect_execute()
            .returning(|_, _| Outcome::Success { rows: vec![] });
        dispatcher.expect_shutdown().times(1).return_const(());

        let mut sink = MockMessageSink::new();
        sink.expect_status().return_const(());
        sink.expect_send()
            .withf(|_, msg| msg.payload() == Some(&json!([])))
            .times(1)
            .return_const(());

        let node = PostgresNode::new(node_config(), resolver(true).await, Arc::new(dispatcher), Arc::new(sink)).await;
        node.receive(Message::with_payload("DELETE FROM t")).await.unwrap();
        node.close().await;
    }
}
