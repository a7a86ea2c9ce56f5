//!
//! pgflow Core - domain model for the pgflow Postgres nodes
//!
//! This crate defines messages, connection descriptors, query requests and
//! outcomes, and the storage and dispatch interfaces the other pgflow
//! crates build on.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - descriptors, requests, and the interfaces around them
pub mod domain;

/// Application services - resolution and credential administration
pub mod application;

/// Core message types
pub mod types;

/// Error types
pub mod error;

/// In-memory storage implementations
pub mod memory;

pub use error::CoreError;
pub use types::{Message, NodeStatus, StatusFill, StatusShape};

pub use application::credentials::{CredentialService, CredentialSummary, CredentialUpdate};
pub use application::resolver::ConfigurationResolver;
pub use domain::descriptor::{ConfigNodeId, ConnectionDescriptor, Credentials, DatabaseConfig};
pub use domain::node::{MessageSink, NodeEvent, QueryDispatch};
pub use domain::repository::{ConfigRegistry, CredentialStore};
pub use domain::request::{Outcome, QueryParameters, QueryRequest, PAYLOAD_ERROR_CODE};
pub use memory::{InMemoryConfigRegistry, InMemoryCredentialStore};

#[cfg(any(test, feature = "testing"))]
pub use domain::node::{MockMessageSink, MockQueryDispatch};
#[cfg(any(test, feature = "testing"))]
pub use domain::repository::{MockConfigRegistry, MockCredentialStore};
