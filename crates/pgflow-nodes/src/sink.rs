//! Broadcasting node events to any number of listeners

use pgflow_core::{Message, MessageSink, NodeEvent, NodeStatus};
use tokio::sync::broadcast;
use tracing::trace;

/// [`MessageSink`] that publishes every call as a [`NodeEvent`]
///
/// Sending never blocks; events are dropped when nobody is subscribed.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<NodeEvent>,
}

impl BroadcastSink {
    /// Create a sink buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: NodeEvent) {
        if self.tx.send(event).is_err() {
            trace!("No subscribers for node event");
        }
    }
}

impl MessageSink for BroadcastSink {
    fn send(&self, node_id: &str, msg: Message) {
        self.publish(NodeEvent::Send {
            node_id: node_id.to_string(),
            msg,
        });
    }

    fn status(&self, node_id: &str, status: NodeStatus) {
        self.publish(NodeEvent::Status {
            node_id: node_id.to_string(),
            status,
        });
    }

    fn error(&self, node_id: &str, error: &str, msg: Option<Message>) {
        self.publish(NodeEvent::Error {
            node_id: node_id.to_string(),
            error: error.to_string(),
            msg,
        });
    }
}
