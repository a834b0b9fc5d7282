use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::health::{health, stats};
use super::metrics::prometheus_metrics;
use super::preferences::preference_definitions;
use super::ApiState;

pub fn api_routes() -> Router<ApiState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Settings screen data
        .route("/preferences/{user_id}", get(preference_definitions))
}

/// Router with request tracing and state attached
pub fn create_router(state: ApiState) -> Router {
    api_routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
