use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use pgflow_postgres::PoolSettings;
use pgflow_server::{api::build_router, FlowDefinition, PgflowServer, ServerConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const FLOW: &str = r#"
nodes:
  - { id: db, type: postgresdb, hostname: 127.0.0.1, port: 1, db: app }
  - { id: q1, type: postgres, postgresdb: db, name: lookup }
  - { id: orphan, type: postgres, postgresdb: nowhere }
"#;

async fn setup() -> (Arc<PgflowServer>, Router) {
    let config = ServerConfig {
        pool: PoolSettings {
            max_connections: 1,
            acquire_timeout_secs: 1,
            idle_timeout_secs: 1,
        },
        input_timeout_secs: 10,
        ..ServerConfig::default()
    };
    let server = Arc::new(PgflowServer::new(config));
    server
        .runtime
        .deploy(FlowDefinition::from_yaml(FLOW).unwrap())
        .await
        .unwrap();
    let app = build_router(server.clone());
    (server, app)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_form(uri: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_get_credentials_when_nothing_stored() {
    let (_, app) = setup().await;
    let (status, body) = send(&app, get("/postgresdb/db")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn test_post_then_get_never_returns_password() {
    let (_, app) = setup().await;

    let (status, body) = send(&app, post_form("/postgresdb/db", "user=alice&password=s3cret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let (status, body) = send(&app, get("/postgresdb/db")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"user": "alice", "hasPassword": true}));
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn test_post_without_password_keeps_stored_password() {
    let (_, app) = setup().await;
    send(&app, post_form("/postgresdb/db", "user=alice&password=s3cret")).await;

    send(&app, post_form("/postgresdb/db", "user=bob")).await;
    let (_, body) = send(&app, get("/postgresdb/db")).await;
    assert_eq!(body, json!({"user": "bob", "hasPassword": true}));

    send(&app, post_form("/postgresdb/db", "user=bob&password=")).await;
    let (_, body) = send(&app, get("/postgresdb/db")).await;
    assert_eq!(body, json!({"user": "bob", "hasPassword": false}));
}

#[tokio::test]
async fn test_post_json_credentials() {
    let (_, app) = setup().await;
    let (status, _) = send(&app, post_json("/postgresdb/db", json!({"user": "carol", "password": "x"}))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/postgresdb/db")).await;
    assert_eq!(body, json!({"user": "carol", "hasPassword": true}));

    let (status, body) = send(&app, post_json("/postgresdb/db", json!({"user": 5}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorDetails"]["errorCode"], "ERR_BAD_REQUEST");
}

#[tokio::test]
async fn test_credentials_for_undeployed_node() {
    let (_, app) = setup().await;
    let (status, _) = send(&app, post_form("/postgresdb/not-yet-deployed", "user=u&password=p")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/postgresdb/not-yet-deployed")).await;
    assert_eq!(body, json!({"user": "u", "hasPassword": true}));
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (_, app) = setup().await;
    send(&app, post_form("/postgresdb/db", "user=alice&password=s3cret")).await;

    for _ in 0..2 {
        let (status, body) = send(&app, delete("/postgresdb/db")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));
    }

    let (_, body) = send(&app, get("/postgresdb/db")).await;
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn test_list_nodes() {
    let (_, app) = setup().await;
    let (status, body) = send(&app, get("/v1/nodes")).await;
    assert_eq!(status, StatusCode::OK);

    let nodes = body.as_array().unwrap();
    assert_eq!(nodes.len(), 3);
    assert!(nodes.contains(&json!({"id": "db", "type": "postgresdb"})));
    assert!(nodes.contains(&json!({"id": "q1", "type": "postgres", "name": "lookup", "configured": true})));
    assert!(nodes.contains(&json!({"id": "orphan", "type": "postgres", "configured": false})));
}

#[tokio::test]
async fn test_inject_without_payload_reports_caller_error() {
    let (_, app) = setup().await;
    let (status, body) = send(&app, post_json("/v1/nodes/q1/input", json!({"topic": "t"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorDetails"]["errorCode"], "postgres.errors.payload");
}

#[tokio::test]
async fn test_inject_rejects_non_object_message() {
    let (_, app) = setup().await;
    let (status, body) = send(&app, post_json("/v1/nodes/q1/input", json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorDetails"]["errorCode"], "ERR_VALIDATION_ERROR");
}

#[tokio::test]
async fn test_inject_unknown_and_unconfigured_nodes() {
    let (_, app) = setup().await;

    let (status, _) = send(&app, post_json("/v1/nodes/nope/input", json!({"payload": "SELECT 1"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, post_json("/v1/nodes/orphan/input", json!({"payload": "SELECT 1"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["errorDetails"]["errorCode"], "ERR_NODE_NOT_CONFIGURED");
}

#[tokio::test]
async fn test_inject_unreachable_database_emits_error_message() {
    let (_, app) = setup().await;
    let (status, body) = send(
        &app,
        post_json("/v1/nodes/q1/input", json!({"payload": "SELECT 1", "topic": "keep-me"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert_eq!(body["payload"], "");
    assert_eq!(body["topic"], "keep-me");
    assert!(body["_msgid"].is_string());
}

#[tokio::test]
async fn test_health() {
    let (_, app) = setup().await;
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "UP");
    assert_eq!(body["nodes"], 3);
}
