//! Health check endpoint
//!
//! Provides a simple health check for monitoring and load balancers.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::handlers::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Number of registered routes
    pub routes: usize,
    /// Metrics status: "operational" or "degraded"
    pub metrics_status: String,
}

/// Health check handler
///
/// Returns 200 OK with the route count and metrics status.
///
/// Metrics status is "degraded" if any metrics recording failure has occurred,
/// otherwise "operational". Backend health is not probed.
pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let metrics_status = if state.metrics().metrics_recording_failures_count() > 0 {
        "degraded"
    } else {
        "operational"
    };

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK".to_string(),
            routes: state.router().registry().len(),
            metrics_status: metrics_status.to_string(),
        }),
    )
}
