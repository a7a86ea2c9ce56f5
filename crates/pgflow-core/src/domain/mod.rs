/// Connection configuration, credentials and descriptors
pub mod descriptor;

/// Query requests and outcomes
pub mod request;

/// Configuration and credential storage interfaces
pub mod repository;

/// Node/host contracts
pub mod node;
