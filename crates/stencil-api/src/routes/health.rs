//! Health check and service info endpoints

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Health status response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Service banner
#[derive(Serialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
}

/// Health check handler
async fn health() -> Json<HealthResponse> {
    metrics::counter!("stencil_health_checks_total").increment(1);

    Json(HealthResponse {
        status: "healthy".to_string(),
        message: "API is running".to_string(),
    })
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Stencil template sharing API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health))
        .route("/healthz", get(health))
}
