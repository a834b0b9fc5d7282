//! Prometheus metrics for push dispatch.
//!
//! - Queue decisions taken when activities are created
//! - Dispatch outcomes and skipped passes
//! - Provider round-trip latency
//! - Whether a provider credential is configured

mod helpers;

pub use helpers::{encode_metrics, DeliveryMetrics, DispatchMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Histogram, IntCounterVec,
    IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "push";

lazy_static! {
    /// Creation-time queue decisions
    pub static ref QUEUE_DECISIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_queue_decisions_total", METRIC_PREFIX),
        "Queue decisions taken for created activities",
        &["decision"]
    ).unwrap();

    /// Completed delivery attempts by resulting status
    pub static ref DISPATCH_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_total", METRIC_PREFIX),
        "Delivery attempts by resulting status",
        &["status"]
    ).unwrap();

    /// Pipeline passes that did not attempt delivery
    pub static ref DISPATCH_SKIPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_skipped_total", METRIC_PREFIX),
        "Pipeline passes that did not attempt delivery",
        &["reason"]
    ).unwrap();

    /// Provider round-trip latency
    pub static ref DELIVERY_LATENCY: Histogram = register_histogram!(
        format!("{}_delivery_latency_seconds", METRIC_PREFIX),
        "Provider round-trip latency in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    /// Provider credential status (1 = configured, 0 = not configured)
    pub static ref CONFIGURED: IntGauge = register_int_gauge!(
        format!("{}_configured", METRIC_PREFIX),
        "Whether a provider credential is configured (1=yes, 0=no)"
    ).unwrap();
}
