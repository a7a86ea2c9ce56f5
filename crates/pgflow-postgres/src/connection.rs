//! Building pools from connection descriptors

use pgflow_core::{ConnectionDescriptor, CoreError};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use tracing::debug;

use crate::PoolSettings;

/// Application name reported to the server
pub const APPLICATION_NAME: &str = "pgflow";

/// Translate a descriptor into sqlx connect options
pub fn connect_options(descriptor: &ConnectionDescriptor) -> PgConnectOptions {
    let ssl_mode = if descriptor.use_tls {
        PgSslMode::Require
    } else {
        PgSslMode::Disable
    };

    let mut options = PgConnectOptions::new()
        .host(&descriptor.host)
        .port(descriptor.port)
        .database(&descriptor.database)
        .ssl_mode(ssl_mode)
        .application_name(APPLICATION_NAME);

    if let Some(user) = descriptor.user.as_deref() {
        options = options.username(user);
    }
    if let Some(password) = descriptor.password.as_deref() {
        options = options.password(password);
    }
    options
}

/// Create a pool for `descriptor` without opening any connection yet
///
/// The first physical connection is made on the first acquire, so network
/// and authentication problems surface per request rather than here.
pub fn create_pool(descriptor: &ConnectionDescriptor, settings: &PoolSettings) -> PgPool {
    debug!(
        config_id = %descriptor.id,
        host = %descriptor.host,
        port = descriptor.port,
        max_connections = settings.max_connections,
        "Creating connection pool"
    );
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(0)
        .acquire_timeout(settings.acquire_timeout())
        .idle_timeout(Some(settings.idle_timeout()))
        .connect_lazy_with(connect_options(descriptor))
}

/// Map a failure to obtain a connection
pub fn connection_error(err: sqlx::Error) -> CoreError {
    match err {
        sqlx::Error::Database(db) => CoreError::ConnectionError(db.message().to_string()),
        other => CoreError::ConnectionError(other.to_string()),
    }
}

/// Map a failure while running a statement
pub fn execution_error(err: sqlx::Error) -> CoreError {
    match err {
        sqlx::Error::Database(db) => CoreError::ExecutionError(db.message().to_string()),
        other => CoreError::ExecutionError(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ConnectionDescriptor {
        ConnectionDescriptor {
            id: "db".into(),
            host: "db.internal".into(),
            port: 6543,
            database: "orders".into(),
            use_tls: true,
            user: Some("orders".into()),
            password: Some("secret".into()),
        }
    }

    #[test]
    fn test_connect_options_follow_descriptor() {
        let options = connect_options(&descriptor());
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_database(), Some("orders"));
        assert_eq!(options.get_username(), "orders");
        assert!(matches!(options.get_ssl_mode(), PgSslMode::Require));
        assert_eq!(options.get_application_name(), Some(APPLICATION_NAME));
    }

    #[test]
    fn test_tls_disabled_when_not_requested() {
        let mut plain = descriptor();
        plain.use_tls = false;
        assert!(matches!(connect_options(&plain).get_ssl_mode(), PgSslMode::Disable));
    }

    #[test]
    fn test_non_database_errors_keep_driver_text() {
        let err = connection_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, CoreError::ConnectionError(ref m) if m.contains("timed out")));

        let err = execution_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, CoreError::ExecutionError(_)));
    }

    #[tokio::test]
    async fn test_create_pool_is_lazy() {
        let pool = create_pool(&descriptor(), &PoolSettings::default());
        assert_eq!(pool.size(), 0);
        pool.close().await;
    }
}
