//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{CONFIGURED, DELIVERY_LATENCY, DISPATCH_SKIPPED_TOTAL, DISPATCH_TOTAL, QUEUE_DECISIONS_TOTAL};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording pipeline metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record a creation-time queue decision
    pub fn record_queue_decision(decision: &str) {
        QUEUE_DECISIONS_TOTAL.with_label_values(&[decision]).inc();
    }

    /// Record the status a delivery attempt ended with
    pub fn record_dispatch(status: &str) {
        DISPATCH_TOTAL.with_label_values(&[status]).inc();
    }

    /// Record a pass that stopped before delivery
    pub fn record_skipped(reason: &str) {
        DISPATCH_SKIPPED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn set_configured(configured: bool) {
        CONFIGURED.set(if configured { 1 } else { 0 });
    }
}

/// Helper struct for recording provider metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    pub fn observe_latency(duration: Duration) {
        DELIVERY_LATENCY.observe(duration.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_recorded_metrics() {
        DispatchMetrics::record_queue_decision("queued");
        DispatchMetrics::record_dispatch("sent");
        DispatchMetrics::set_configured(true);
        DeliveryMetrics::observe_latency(Duration::from_millis(20));

        let output = encode_metrics().unwrap();
        assert!(output.contains("push_queue_decisions_total"));
        assert!(output.contains("push_dispatch_total"));
        assert!(output.contains("push_configured"));
        assert!(output.contains("push_delivery_latency_seconds"));
    }
}
