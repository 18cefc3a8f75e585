//! Health check handler

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::server::AppState;

/// Response for the basic health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    /// RFC 3339 timestamp of the check
    pub timestamp: String,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "keygate",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.metrics.uptime_seconds(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
