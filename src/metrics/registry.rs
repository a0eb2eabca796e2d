// Prometheus metrics registry and collectors
// Author: kelexine (https://github.com/kelexine)

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry, CounterVec,
    Encoder, HistogramVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // CACHE METRICS
    // ============================================================================

    /// Cache operations by kind and result
    pub static ref CACHE_OPERATIONS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("cache_operations_total", "Total cache operations"),
        &["operation", "result"], // result: hit, miss, ok, recovered, skipped
        REGISTRY
    ).unwrap();

    /// Cache operation duration
    pub static ref CACHE_OPERATION_DURATION: HistogramVec = register_histogram_vec_with_registry!(
        prometheus::HistogramOpts::new("cache_operation_duration_seconds", "Cache operation duration in seconds")
            .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["operation"],
        REGISTRY
    ).unwrap();

    /// Recovered cache errors
    pub static ref CACHE_ERRORS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("cache_errors_total", "Cache errors recovered without failing the caller"),
        &["operation", "error_type"],
        REGISTRY
    ).unwrap();

    // ============================================================================
    // STORE METRICS
    // ============================================================================

    /// Database open attempts
    pub static ref STORE_OPENS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("cache_store_opens_total", "Cache database open attempts"),
        &["status"], // status: success, failure
        REGISTRY
    ).unwrap();

    /// Namespace fallbacks to the shared namespace
    pub static ref NAMESPACE_FALLBACKS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("cache_namespace_fallbacks_total", "Namespace resolutions that fell back to the shared namespace"),
        &["reason"],
        REGISTRY
    ).unwrap();
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# failed to encode metrics: {}\n", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        CACHE_OPERATIONS.with_label_values(&["get", "hit"]).inc();
        STORE_OPENS.with_label_values(&["success"]).inc();

        let metrics = gather_metrics();
        assert!(metrics.contains("cache_operations_total"));
        assert!(metrics.contains("cache_store_opens_total"));
    }
}
