use axum::{Json, extract::State, response::IntoResponse};

use crate::metrics;
use crate::server::RelayState;

/// Health check endpoint - returns relay status
pub async fn health_handler(State(state): State<RelayState>) -> impl IntoResponse {
    let (customers, agents) = state.registry.counts();
    let metrics = state.metrics.snapshot();

    Json(metrics::HealthStatus {
        status: "healthy".to_string(),
        customers: customers as u64,
        agents: agents as u64,
        connections: metrics.connections.active,
        uptime_secs: metrics.uptime_secs,
    })
}

/// Metrics endpoint - returns detailed relay metrics
pub async fn metrics_handler(State(state): State<RelayState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}
