//! sqlx-backed [`QueryDispatch`] implementation

use async_trait::async_trait;
use pgflow_core::{ConnectionDescriptor, CoreError, Outcome, QueryDispatch, QueryRequest};
use serde_json::{Map, Value};
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgTypeInfo;
use sqlx::{Executor, Postgres, Statement};
use tracing::debug;

use crate::connection::{connection_error, execution_error};
use crate::named::{self, BoundQuery};
use crate::params;
use crate::registry::PoolRegistry;
use crate::rows::rows_to_json;
use crate::PoolSettings;

/// Dispatches requests through a pool per configuration node
pub struct PgQueryDispatcher {
    registry: PoolRegistry,
}

impl PgQueryDispatcher {
    /// Create a dispatcher whose pools use `settings`
    pub fn new(settings: PoolSettings) -> Self {
        Self {
            registry: PoolRegistry::new(settings),
        }
    }

    /// The pools owned by this dispatcher
    pub fn registry(&self) -> &PoolRegistry {
        &self.registry
    }

    async fn dispatch(
        &self,
        descriptor: &ConnectionDescriptor,
        request: &QueryRequest,
    ) -> Result<Vec<Map<String, Value>>, CoreError> {
        let pool = self.registry.get_or_create(descriptor).await;
        let conn = pool.acquire().await.map_err(connection_error)?;
        let bound = named::bind(&request.sql_text, &request.parameters)?;
        run(conn, bound).await
    }
}

/// Run one statement on `conn`, which goes back to its pool when this returns
async fn run(
    mut conn: PoolConnection<Postgres>,
    bound: BoundQuery,
) -> Result<Vec<Map<String, Value>>, CoreError> {
    debug!(params = bound.values.len(), "Executing statement");

    let rows = if bound.values.is_empty() {
        // Simple protocol, so scripts with several statements work
        (&mut *conn)
            .fetch_all(sqlx::raw_sql(&bound.sql))
            .await
            .map_err(execution_error)?
    } else {
        // Preparing first gives the parameter types the server inferred
        let statement = (&mut *conn)
            .prepare(bound.sql.as_str())
            .await
            .map_err(execution_error)?;
        let types: Vec<PgTypeInfo> = statement
            .parameters()
            .and_then(|p| p.left())
            .map(<[PgTypeInfo]>::to_vec)
            .unwrap_or_default();

        let mut query = sqlx::query(&bound.sql);
        for param in params::convert_all(&bound.values, &types)? {
            query = query.bind(param);
        }
        (&mut *conn).fetch_all(query).await.map_err(execution_error)?
    };

    Ok(rows_to_json(&rows))
}

#[async_trait]
impl QueryDispatch for PgQueryDispatcher {
    async fn execute(&self, descriptor: &ConnectionDescriptor, request: QueryRequest) -> Outcome {
        match self.dispatch(descriptor, &request).await {
            Ok(rows) => {
                debug!(config_id = %descriptor.id, rows = rows.len(), "Query succeeded");
                Outcome::Success { rows }
            }
            Err(err) => {
                debug!(config_id = %descriptor.id, error = %err, "Query failed");
                Outcome::failure(&err)
            }
        }
    }

    async fn shutdown(&self) {
        self.registry.shutdown().await;
    }
}
