//! HTTP read endpoint tests.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use dagwatch::server::{build_router, ServerState};
use dagwatch::{AlertSnapshot, MemorySnapshotStore, SnapshotStore};

fn app(store: Arc<MemorySnapshotStore>, token: Option<&str>) -> Router {
    build_router(Arc::new(ServerState::new(
        store,
        token.map(str::to_string),
    )))
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_get_message_defaults_to_empty() {
    let response = app(Arc::new(MemorySnapshotStore::new()), None)
        .oneshot(Request::get("/message").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "");
    assert_eq!(body["title"], "");
    assert_eq!(body["color"], "");
}

#[tokio::test]
async fn test_get_message_returns_published_snapshot() {
    let store = Arc::new(MemorySnapshotStore::new());
    store
        .publish(&AlertSnapshot {
            message: "<h4>Information</h4>".to_string(),
            title: "1 failed: 'etl' (severity 2)".to_string(),
            color: "#FF9900".to_string(),
        })
        .await
        .unwrap();

    let response = app(store, None)
        .oneshot(Request::get("/message").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["title"], "1 failed: 'etl' (severity 2)");
    assert_eq!(body["color"], "#FF9900");
}

#[tokio::test]
async fn test_post_message_replaces_snapshot() {
    let store = Arc::new(MemorySnapshotStore::new());
    let response = app(store.clone(), None)
        .oneshot(
            Request::post("/message")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("message=manual&color=%23FF0000"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        store.current().await.unwrap(),
        AlertSnapshot {
            message: "manual".to_string(),
            title: String::new(),
            color: "#FF0000".to_string(),
        }
    );
}

#[tokio::test]
async fn test_bearer_token_required_when_configured() {
    let store = Arc::new(MemorySnapshotStore::new());

    let response = app(store.clone(), Some("s3cret"))
        .oneshot(Request::get("/message").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app(store.clone(), Some("s3cret"))
        .oneshot(
            Request::get("/message")
                .header(header::AUTHORIZATION, "Bearer wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app(store, Some("s3cret"))
        .oneshot(
            Request::get("/message")
                .header(header::AUTHORIZATION, "Bearer s3cret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_is_open() {
    let response = app(Arc::new(MemorySnapshotStore::new()), Some("s3cret"))
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}
