//! HTTP surface a host can mount next to its own routes.
//!
//! - `GET /health`: configuration status and uptime
//! - `GET /stats`: dispatcher counters
//! - `GET /metrics`: Prometheus exposition
//! - `GET /preferences/{user_id}`: preference definitions as that user should see them

mod health;
mod metrics;
mod preferences;
mod routes;
mod state;

pub use health::{health, stats, HealthResponse};
pub use metrics::prometheus_metrics;
pub use preferences::preference_definitions;
pub use routes::{api_routes, create_router};
pub use state::ApiState;
