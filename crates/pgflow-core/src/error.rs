use thiserror::Error;

/// Core error type for pgflow
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No configuration node is registered under the given identity
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    /// The configuration node exists but lacks a required field
    #[error("Configuration incomplete: {0}")]
    ConfigurationIncomplete(String),

    /// Network, TLS, authentication or availability failure while acquiring
    /// a pooled connection
    #[error("{0}")]
    ConnectionError(String),

    /// SQL-level failure while executing a statement
    #[error("{0}")]
    ExecutionError(String),

    /// Malformed inbound message; reported on the node error channel
    #[error("Caller error: {0}")]
    CallerError(String),

    /// Credential store error
    #[error("Credential store error: {0}")]
    CredentialStoreError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Whether this error is a caller/programming error rather than a
    /// database condition
    pub fn is_caller_error(&self) -> bool {
        matches!(self, CoreError::CallerError(_))
    }

    /// Whether this error was produced while resolving configuration
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            CoreError::ConfigurationMissing(_) | CoreError::ConfigurationIncomplete(_)
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (CoreError::ConfigurationMissing("db".to_string()), "Configuration missing: db"),
            (CoreError::ConfigurationIncomplete("host".to_string()), "Configuration incomplete: host"),
            (CoreError::ConnectionError("connection refused".to_string()), "connection refused"),
            (CoreError::ExecutionError("relation \"t\" does not exist".to_string()), "relation \"t\" does not exist"),
            (CoreError::CallerError("postgres.errors.payload".to_string()), "Caller error: postgres.errors.payload"),
            (CoreError::CredentialStoreError("poisoned".to_string()), "Credential store error: poisoned"),
            (CoreError::SerializationError("ser_err".to_string()), "Serialization error: ser_err"),
            (CoreError::Other("other_err".to_string()), "other_err"),
        ];

        for (error, expected_msg) in errors {
            assert_eq!(error.to_string(), expected_msg);
        }
    }

    #[test]
    fn test_classification() {
        assert!(CoreError::CallerError("x".into()).is_caller_error());
        assert!(!CoreError::ExecutionError("x".into()).is_caller_error());
        assert!(CoreError::ConfigurationMissing("x".into()).is_configuration_error());
        assert!(CoreError::ConfigurationIncomplete("x".into()).is_configuration_error());
        assert!(!CoreError::ConnectionError("x".into()).is_configuration_error());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error: CoreError = json_error.into();

        match error {
            CoreError::SerializationError(msg) => {
                assert!(msg.contains("expected value"));
            }
            _ => panic!("Expected SerializationError variant"),
        }
    }

    #[test]
    fn test_from_str() {
        let error: CoreError = "test error message".into();
        assert_eq!(error, CoreError::Other("test error message".to_string()));
    }
}
