//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all LeadForge metrics
pub const METRICS_PREFIX: &str = "leadforge";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 250ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.100,  // 100ms
    0.250,  // 250ms - P99 target
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for order build latency (row scans are slower than plain CRUD)
pub const BUILD_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Order metrics
    describe_counter!(
        format!("{}_orders_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total draft orders created"
    );

    describe_counter!(
        format!("{}_orders_paid_total", METRICS_PREFIX),
        Unit::Count,
        "Total orders paid"
    );

    describe_counter!(
        format!("{}_leads_delivered_total", METRICS_PREFIX),
        Unit::Count,
        "Total lead rows delivered across all orders"
    );

    describe_histogram!(
        format!("{}_build_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Order build latency in seconds"
    );

    describe_counter!(
        format!("{}_builds_failed_total", METRICS_PREFIX),
        Unit::Count,
        "Order builds that failed, labeled by error code"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_tables_imported_total", METRICS_PREFIX),
        Unit::Count,
        "Total datasets imported"
    );

    describe_counter!(
        format!("{}_rows_imported_total", METRICS_PREFIX),
        Unit::Count,
        "Total rows imported across all datasets"
    );

    // Database metrics
    describe_gauge!(
        format!("{}_db_connections_active", METRICS_PREFIX),
        Unit::Count,
        "Active database connections"
    );

    describe_histogram!(
        format!("{}_db_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Database query latency in seconds"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record a completed order build
pub fn record_build(duration_secs: f64, delivered_volume: u64) {
    counter!(format!("{}_orders_created_total", METRICS_PREFIX)).increment(1);

    counter!(format!("{}_leads_delivered_total", METRICS_PREFIX)).increment(delivered_volume);

    histogram!(format!("{}_build_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to record a failed order build
pub fn record_build_failure(error_code: &str) {
    counter!(
        format!("{}_builds_failed_total", METRICS_PREFIX),
        "code" => error_code.to_string()
    )
    .increment(1);
}

/// Helper to record a paid order
pub fn record_order_paid(price_cents: i64, method: &str) {
    counter!(
        format!("{}_orders_paid_total", METRICS_PREFIX),
        "method" => method.to_string()
    )
    .increment(1);

    gauge!(format!("{}_last_order_price_cents", METRICS_PREFIX)).set(price_cents as f64);
}

/// Helper to record a dataset import
pub fn record_import(rows: u64) {
    counter!(format!("{}_tables_imported_total", METRICS_PREFIX)).increment(1);

    counter!(format!("{}_rows_imported_total", METRICS_PREFIX)).increment(rows);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        // Verify buckets are sorted and contain SLO targets
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }

        // P50 target (50ms) should be in buckets
        assert!(LATENCY_BUCKETS.contains(&0.050));
        // P99 target (250ms) should be in buckets
        assert!(LATENCY_BUCKETS.contains(&0.250));
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("POST", "/v1/orders");
        std::thread::sleep(std::time::Duration::from_millis(10));
        metrics.finish(201);
        // Just verify it runs without panic
    }
}
