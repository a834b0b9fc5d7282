//! Prometheus metrics endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::error::AppError;
use crate::metrics::{self, DispatchMetrics};

use super::ApiState;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<ApiState>) -> Result<impl IntoResponse, AppError> {
    DispatchMetrics::set_configured(state.dispatcher.is_configured());

    let output = metrics::encode_metrics().map_err(|e| {
        AppError::Internal(format!("Failed to encode metrics: {}", e))
    })?;

    Ok((
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        output,
    ))
}
