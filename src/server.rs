//! Health endpoint for the hosting platform

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
struct HealthState {
    backend: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: &'static str,
}

async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", backend: state.backend })
}

pub fn health_router(backend: &'static str) -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(HealthState { backend })
}

pub async fn serve_health(addr: SocketAddr, backend: &'static str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🩺 Health endpoint ready: http://{}/health", addr);
    axum::serve(listener, health_router(backend)).await?;
    Ok(())
}
