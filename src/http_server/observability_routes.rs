//! Observability HTTP Routes
//!
//! `GET /health` and `GET /metrics`. Plain JSON, not envelopes.

use axum::extract::State;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use serde_json::json;

use super::server::DispatchState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub fn observability_routes() -> Router<DispatchState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
}

async fn health_handler() -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(response))
}

async fn metrics_handler(State(state): State<DispatchState>) -> impl IntoResponse {
    let router = state.dispatcher.router();
    let body = json!({
        "requests": state.dispatcher.metrics().to_json(),
        "routes": router.snapshot().len(),
        "route_revision": router.revision(),
    });

    (StatusCode::OK, Json(body))
}
