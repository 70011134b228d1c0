//! Read-only HTTP status surface.
//!
//! | Route                     | Body                                   |
//! |---------------------------|----------------------------------------|
//! | `/status`, `/`, `/state`  | hub snapshot (JSON)                    |
//! | `/health`                 | worker health records (JSON)           |
//! | `/livez`                  | liveness check                         |
//! | `/image`                  | latest annotated frame, 404 until one  |

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use tracing::info;

use loupguard_core::{Hub, HubSnapshot, WorkerHealth};

pub(crate) fn router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/state", get(status))
        .route("/status", get(status))
        .route("/health", get(health))
        .route("/livez", get(livez))
        .route("/image", get(image))
        .with_state(hub)
}

async fn status(State(hub): State<Arc<Hub>>) -> Json<HubSnapshot> {
    Json(hub.snapshot())
}

async fn health(State(hub): State<Arc<Hub>>) -> Json<BTreeMap<String, WorkerHealth>> {
    Json(hub.health_snapshot())
}

async fn livez() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn image(State(hub): State<Arc<Hub>>) -> Response {
    match hub.latest_snapshot() {
        Some(snapshot) => (
            [(header::CONTENT_TYPE, snapshot.frame.content_type.clone())],
            snapshot.frame.data.clone(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "no processed image yet").into_response(),
    }
}

/// Serve the status routes until `shutdown` fires.
pub(crate) async fn serve(
    addr: SocketAddr,
    hub: Arc<Hub>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Status endpoint listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(hub))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
