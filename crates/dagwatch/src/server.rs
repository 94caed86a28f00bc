//! HTTP read endpoint for the published snapshot.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::snapshot::{AlertSnapshot, SnapshotStore};

/// Server state
pub struct ServerState {
    pub store: Arc<dyn SnapshotStore>,
    /// Bearer token required on `/message` when set
    pub api_token: Option<String>,
}

impl ServerState {
    #[must_use]
    pub fn new(store: Arc<dyn SnapshotStore>, api_token: Option<String>) -> Self {
        Self { store, api_token }
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = self.api_token.as_deref() else {
            return true;
        };
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected)
    }
}

/// Build the snapshot router.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/message", get(get_message).post(set_message))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn run_server(state: Arc<ServerState>, addr: &str) -> std::io::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Snapshot server listening on {addr}");

    axum::serve(listener, app).await
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Manual override of the published snapshot
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessageForm {
    message: String,
    title: String,
    color: String,
}

async fn get_message(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized");
    }

    match state.store.current().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to read snapshot");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn set_message(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Form(form): Form<MessageForm>,
) -> Response {
    if !state.authorized(&headers) {
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized");
    }

    let snapshot = AlertSnapshot {
        message: form.message,
        title: form.title,
        color: form.color,
    };
    match state.store.publish(&snapshot).await {
        Ok(()) => {
            info!(color = %snapshot.color, "Snapshot replaced over HTTP");
            Json(snapshot).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to publish snapshot");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
