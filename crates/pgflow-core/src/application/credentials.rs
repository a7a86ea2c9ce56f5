//! Administrative credential operations
//!
//! Backs the `/postgresdb/{id}` admin endpoints. The password is write-only:
//! reads only ever report whether one is stored.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::descriptor::{ConfigNodeId, Credentials};
use crate::domain::repository::CredentialStore;
use crate::CoreError;

/// Incoming credential update, as submitted by the editor
///
/// `None` means the field was not submitted at all; `Some("")` means it was
/// submitted empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialUpdate {
    /// Submitted user
    pub user: Option<String>,
    /// Submitted password
    pub password: Option<String>,
}

impl CredentialUpdate {
    /// Merge this update into the existing credentials
    ///
    /// - user absent or empty clears the stored user, otherwise replaces it;
    /// - password empty clears the stored password;
    /// - password non-empty replaces it;
    /// - password absent keeps the stored password.
    pub fn apply(self, mut existing: Credentials) -> Credentials {
        existing.user = self.user.filter(|u| !u.is_empty());
        match self.password {
            Some(p) if p.is_empty() => existing.password = None,
            Some(p) => existing.password = Some(p),
            None => {}
        }
        existing
    }
}

/// Non-sensitive view of stored credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CredentialSummary {
    /// Nothing stored; serializes as `{}`
    Empty {},
    /// Something stored
    Stored {
        /// Stored user, omitted when unset
        #[serde(skip_serializing_if = "Option::is_none")]
        user: Option<String>,
        /// Whether a non-empty password is stored
        #[serde(rename = "hasPassword")]
        has_password: bool,
    },
}

impl From<Option<Credentials>> for CredentialSummary {
    fn from(credentials: Option<Credentials>) -> Self {
        match credentials {
            None => CredentialSummary::Empty {},
            Some(creds) => CredentialSummary::Stored {
                has_password: creds.has_password(),
                user: creds.user,
            },
        }
    }
}

/// Credential administration over a [`CredentialStore`]
#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn CredentialStore>,
}

impl CredentialService {
    /// Create a new credential service
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Report what is stored for `id`, without the password
    pub async fn summary(&self, id: &ConfigNodeId) -> Result<CredentialSummary, CoreError> {
        Ok(self.store.get(id).await?.into())
    }

    /// Merge an update into the stored credentials
    pub async fn update(&self, id: &ConfigNodeId, update: CredentialUpdate) -> Result<(), CoreError> {
        let existing = self.store.get(id).await?.unwrap_or_default();
        let merged = update.apply(existing);
        debug!(config_id = %id, has_user = merged.user.is_some(), has_password = merged.has_password(), "Storing credentials");
        self.store.put(id, merged).await?;
        info!(config_id = %id, "Credentials updated");
        Ok(())
    }

    /// Delete the stored credentials; idempotent
    pub async fn delete(&self, id: &ConfigNodeId) -> Result<(), CoreError> {
        self.store.delete(id).await?;
        info!(config_id = %id, "Credentials deleted");
        Ok(())
    }
}
