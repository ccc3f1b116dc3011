//! Prometheus metrics for the expiry notifier.
//!
//! - Notification outcomes (sent, failed, skipped as duplicate)
//! - Registry request outcomes
//! - API key rejections
//! - Workflow latency per operation

mod helpers;

pub use helpers::{encode_metrics, AuthMetrics, NotificationMetrics, RegistryMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "stars";

lazy_static! {
    /// Expiry emails accepted by the email provider
    pub static ref NOTIFICATIONS_SENT_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_sent_total", METRIC_PREFIX),
        "Total expiry notification emails sent"
    ).unwrap();

    /// Expiry emails that could not be delivered
    pub static ref NOTIFICATIONS_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_failed_total", METRIC_PREFIX),
        "Total expiry notification emails that failed"
    ).unwrap();

    /// Records suppressed because they were already notified
    pub static ref NOTIFICATIONS_SKIPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_skipped_total", METRIC_PREFIX),
        "Total records skipped as already notified"
    ).unwrap();

    /// Registry calls by outcome (ok, error)
    pub static ref REGISTRY_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_registry_requests_total", METRIC_PREFIX),
        "Total STARS registry requests",
        &["outcome"]
    ).unwrap();

    /// Rejected API calls by reason (missing, invalid)
    pub static ref AUTH_REJECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_auth_rejections_total", METRIC_PREFIX),
        "Total requests rejected by API key authentication",
        &["reason"]
    ).unwrap();

    /// End-to-end duration of workflow operations
    pub static ref WORKFLOW_DURATION: HistogramVec = register_histogram_vec!(
        format!("{}_workflow_duration_seconds", METRIC_PREFIX),
        "Workflow operation duration in seconds",
        &["operation"],
        vec![0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();
}
