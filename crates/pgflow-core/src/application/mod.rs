/// Configuration resolution
pub mod resolver;

/// Credential administration
pub mod credentials;
