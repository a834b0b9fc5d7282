//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::notification::DispatcherStatsSnapshot;

use super::ApiState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub channel: String,
    /// Whether a provider credential is provisioned
    pub configured: bool,
}

pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let configured = state.dispatcher.is_configured();
    let status = if configured { "healthy" } else { "idle" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        channel: state.dispatcher.channel().to_string(),
        configured,
    })
}

pub async fn stats(State(state): State<ApiState>) -> Json<DispatcherStatsSnapshot> {
    Json(state.dispatcher.stats())
}
