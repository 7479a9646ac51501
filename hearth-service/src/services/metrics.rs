//! Prometheus metrics for hearth-service.

use hearth_core::middleware::metrics::{HTTP_REQUEST_DURATION, HTTP_REQUESTS_TOTAL};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "hearth_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Rule application counter.
pub static RULES_APPLIED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hearth_rules_applied_total",
        "Total number of rule patches applied to transactions",
        &["outcome"] // applied, error
    )
    .expect("Failed to register rules_applied_total")
});

/// Bulk import counter.
pub static TRANSACTIONS_IMPORTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hearth_transactions_imported_total",
        "Total number of transaction records in bulk imports",
        &["outcome"] // imported, skipped
    )
    .expect("Failed to register transactions_imported_total")
});

/// Payoff plan counter by strategy.
pub static PAYOFF_PLANS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hearth_payoff_plans_total",
        "Total number of payoff plans computed",
        &["strategy"]
    )
    .expect("Failed to register payoff_plans_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&HTTP_REQUESTS_TOTAL);
    Lazy::force(&HTTP_REQUEST_DURATION);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&RULES_APPLIED_TOTAL);
    Lazy::force(&TRANSACTIONS_IMPORTED_TOTAL);
    Lazy::force(&PAYOFF_PLANS_TOTAL);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
