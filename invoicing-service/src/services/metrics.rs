//! Prometheus metrics for invoicing-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Counter for invoice lifecycle operations by operation and outcome.
pub static INVOICE_OPERATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_invoice_operations_total",
        "Total number of invoice lifecycle operations",
        &["operation", "status"]
    )
    .expect("Failed to register INVOICE_OPERATIONS")
});

/// Counter for recorded payments by method.
pub static PAYMENTS_RECORDED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_payments_recorded_total",
        "Total number of payments recorded",
        &["method"]
    )
    .expect("Failed to register PAYMENTS_RECORDED")
});

/// Counter for idempotency guard decisions.
pub static IDEMPOTENCY_OUTCOMES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_idempotency_outcomes_total",
        "Idempotency guard decisions",
        &["outcome"]
    )
    .expect("Failed to register IDEMPOTENCY_OUTCOMES")
});

/// Histogram for database query duration.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "invoicing_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Counter for errors.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&INVOICE_OPERATIONS);
    Lazy::force(&PAYMENTS_RECORDED);
    Lazy::force(&IDEMPOTENCY_OUTCOMES);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&ERRORS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_invoice_operation(operation: &str, status: &str) {
    INVOICE_OPERATIONS
        .with_label_values(&[operation, status])
        .inc();
}

pub fn record_payment(method: &str) {
    // Free-text input; keep the label set bounded.
    let method = match method {
        "" => "unspecified",
        "bank-transfer" | "card" | "cash" => method,
        _ => "other",
    };
    PAYMENTS_RECORDED.with_label_values(&[method]).inc();
}

pub fn record_idempotency_outcome(outcome: &str) {
    IDEMPOTENCY_OUTCOMES.with_label_values(&[outcome]).inc();
}

pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}
