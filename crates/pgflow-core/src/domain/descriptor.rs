//! Connection configuration and credentials

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a `postgresdb` configuration node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ConfigNodeId(pub String);

impl ConfigNodeId {
    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConfigNodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ConfigNodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

fn default_port() -> u16 {
    5432
}

/// Non-sensitive fields of a `postgresdb` configuration node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Node identity
    pub id: ConfigNodeId,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Server host name or address
    #[serde(default)]
    pub hostname: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name
    #[serde(default)]
    pub db: String,

    /// Whether to require TLS
    #[serde(default)]
    pub ssl: bool,
}

/// Stored credentials of a configuration node
///
/// Either field may be absent. Absence is not an error until the server
/// rejects the connection.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    /// User name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Credentials {
    /// Whether a non-empty password is stored
    pub fn has_password(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Whether neither field is stored
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.password.is_none()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Immutable snapshot of connection parameters plus resolved credentials
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    /// Identity of the configuration node this was resolved from
    pub id: ConfigNodeId,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database name
    pub database: String,
    /// Require TLS
    pub use_tls: bool,
    /// User name
    pub user: Option<String>,
    /// Password
    pub password: Option<String>,
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("use_tls", &self.use_tls)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
