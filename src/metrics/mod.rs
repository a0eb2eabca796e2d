// Metrics module for Prometheus observability
// Author: kelexine (https://github.com/kelexine)

mod registry;

pub use registry::{
    gather_metrics,
    CACHE_ERRORS,
    CACHE_OPERATIONS,
    CACHE_OPERATION_DURATION,
    NAMESPACE_FALLBACKS,
    STORE_OPENS,
};

/// Helper to record a finished cache operation
pub fn record_operation(operation: &str, result: &str, duration_secs: f64) {
    CACHE_OPERATIONS
        .with_label_values(&[operation, result])
        .inc();

    CACHE_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}

/// Helper to record an error that was recovered locally
pub fn record_recovered_error(operation: &str, error_type: &str) {
    CACHE_ERRORS
        .with_label_values(&[operation, error_type])
        .inc();
}

/// Helper to record database open attempts
pub fn record_store_open(success: bool) {
    let status = if success { "success" } else { "failure" };
    STORE_OPENS.with_label_values(&[status]).inc();
}

pub fn record_namespace_fallback() {
    NAMESPACE_FALLBACKS.with_label_values(&["resolution_failed"]).inc();
}
