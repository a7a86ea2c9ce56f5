//! Contracts between nodes and the host that wires them

use async_trait::async_trait;
use serde::Serialize;

use super::descriptor::ConnectionDescriptor;
use super::request::{Outcome, QueryRequest};
use crate::types::{Message, NodeStatus};

/// Channel through which a node reports to the host
///
/// Calls must not block; implementations typically forward into a channel.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait MessageSink: Send + Sync {
    /// Emit a message on the node's output
    fn send(&self, node_id: &str, msg: Message);

    /// Update the operator-facing status of the node
    fn status(&self, node_id: &str, status: NodeStatus);

    /// Raise a node-level error, optionally tied to the offending message
    fn error(&self, node_id: &str, error: &str, msg: Option<Message>);
}

/// Executes requests against a database described by a descriptor
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait QueryDispatch: Send + Sync {
    /// Run one request; every failure is folded into [`Outcome::Failure`]
    async fn execute(&self, descriptor: &ConnectionDescriptor, request: QueryRequest) -> Outcome;

    /// Close every pool owned by this dispatcher
    async fn shutdown(&self);
}

/// Event reported by a node, as seen by the host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum NodeEvent {
    /// A message was emitted downstream
    Send {
        /// Emitting node
        node_id: String,
        /// The message
        msg: Message,
    },
    /// The node status changed
    Status {
        /// Node
        node_id: String,
        /// New status
        status: NodeStatus,
    },
    /// The node raised an error
    Error {
        /// Node
        node_id: String,
        /// Error text or code
        error: String,
        /// Offending message, if any
        msg: Option<Message>,
    },
}

impl NodeEvent {
    /// Node that produced the event
    pub fn node_id(&self) -> &str {
        match self {
            NodeEvent::Send { node_id, .. }
            | NodeEvent::Status { node_id, .. }
            | NodeEvent::Error { node_id, .. } => node_id,
        }
    }

    /// Identifier of the message the event refers to, if any
    pub fn msg_id(&self) -> Option<&str> {
        match self {
            NodeEvent::Send { msg, .. } => msg.msg_id(),
            NodeEvent::Error { msg, .. } => msg.as_ref().and_then(Message::msg_id),
            NodeEvent::Status { .. } => None,
        }
    }
}
