//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    AUTH_REJECTIONS_TOTAL, NOTIFICATIONS_FAILED_TOTAL, NOTIFICATIONS_SENT_TOTAL,
    NOTIFICATIONS_SKIPPED_TOTAL, REGISTRY_REQUESTS_TOTAL, WORKFLOW_DURATION,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording notification outcomes
pub struct NotificationMetrics;

impl NotificationMetrics {
    pub fn record_sent() {
        NOTIFICATIONS_SENT_TOTAL.inc();
    }

    pub fn record_failed() {
        NOTIFICATIONS_FAILED_TOTAL.inc();
    }

    pub fn record_skipped(count: u64) {
        NOTIFICATIONS_SKIPPED_TOTAL.inc_by(count);
    }

    /// Record how long a workflow operation took
    pub fn observe_duration(operation: &str, seconds: f64) {
        WORKFLOW_DURATION
            .with_label_values(&[operation])
            .observe(seconds);
    }
}

/// Helper struct for recording registry calls
pub struct RegistryMetrics;

impl RegistryMetrics {
    pub fn record_ok() {
        REGISTRY_REQUESTS_TOTAL.with_label_values(&["ok"]).inc();
    }

    pub fn record_error() {
        REGISTRY_REQUESTS_TOTAL.with_label_values(&["error"]).inc();
    }
}

/// Helper struct for recording API key rejections
pub struct AuthMetrics;

impl AuthMetrics {
    pub fn record_missing() {
        AUTH_REJECTIONS_TOTAL.with_label_values(&["missing"]).inc();
    }

    pub fn record_invalid() {
        AUTH_REJECTIONS_TOTAL.with_label_values(&["invalid"]).inc();
    }
}
