//! Credential administration endpoints
//!
//! `GET`, `POST` and `DELETE` on `/postgresdb/{id}`. The id does not have to
//! belong to a deployed configuration node: the editor stores credentials
//! before the node is deployed.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use pgflow_core::{ConfigNodeId, CredentialUpdate};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::errors::ApiError;
use crate::server::PgflowServer;

/// Report what is stored, never the password itself
pub async fn get_credentials(
    State(server): State<Arc<PgflowServer>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = server.runtime.credentials().summary(&ConfigNodeId::from(id)).await?;
    Ok(Json(summary))
}

/// Store submitted credentials
pub async fn update_credentials(
    State(server): State<Arc<PgflowServer>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Result<impl IntoResponse, ApiError> {
    let update = if is_json(&headers) {
        parse_json(&body)?
    } else {
        parse_form(&body)
    };
    debug!(
        config_id = %id,
        user_submitted = update.user.is_some(),
        password_submitted = update.password.is_some(),
        "Credential update received"
    );
    server.runtime.credentials().update(&ConfigNodeId::from(id), update).await?;
    Ok(Json(json!({})))
}

/// Forget stored credentials
pub async fn delete_credentials(
    State(server): State<Arc<PgflowServer>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    server.runtime.credentials().delete(&ConfigNodeId::from(id.as_str())).await?;
    info!(config_id = %id, "Credentials deleted");
    Ok(Json(json!({})))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false)
}

/// Parse `user=..&password=..`; when a key repeats, the first value wins
fn parse_form(body: &str) -> CredentialUpdate {
    let mut update = CredentialUpdate::default();
    for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
        match key.as_ref() {
            "user" if update.user.is_none() => update.user = Some(value.into_owned()),
            "password" if update.password.is_none() => update.password = Some(value.into_owned()),
            _ => {}
        }
    }
    update
}

fn parse_json(body: &str) -> Result<CredentialUpdate, ApiError> {
    if body.trim().is_empty() {
        return Ok(CredentialUpdate::default());
    }
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?;
    let object = value
        .as_object()
        .ok_or_else(|| ApiError::BadRequest("Credential body must be a JSON object".to_string()))?;

    let field = |name: &str| -> Result<Option<String>, ApiError> {
        match object.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(ApiError::BadRequest(format!(
                "{} must be a string, got {}",
                name,
                pgflow_core::types::json_type_name(other)
            ))),
        }
    };

    Ok(CredentialUpdate {
        user: field("user")?,
        password: field("password")?,
    })
}
