//! Prometheus metrics for the expectation engine.
//!
//! Tracks request outcomes, expectation lifecycle and matching cost.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use std::time::Duration;

lazy_static! {
    /// Requests handled, by outcome
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "mocksmith_requests_total",
        "Total number of requests handled by the engine",
        &["outcome"]  // outcome: response|forward|error|callback|template|not_found|action_failed
    )
    .unwrap();

    /// Expectations stored through upsert
    pub static ref EXPECTATIONS_UPSERTED_TOTAL: CounterVec = register_counter_vec!(
        "mocksmith_expectations_upserted_total",
        "Total number of expectations upserted",
        &["cause"]  // cause: api|initialization
    )
    .unwrap();

    /// Expectations that used their last remaining match
    pub static ref EXPECTATIONS_EXHAUSTED_TOTAL: CounterVec = register_counter_vec!(
        "mocksmith_expectations_exhausted_total",
        "Total number of expectations exhausted by matching",
        &["action"]
    )
    .unwrap();

    /// Expectations currently eligible to match, summed over every store
    pub static ref ACTIVE_EXPECTATIONS: Gauge = register_gauge!(
        "mocksmith_active_expectations",
        "Number of expectations currently eligible to match"
    )
    .unwrap();

    /// Time spent selecting an expectation for a request
    pub static ref MATCH_DURATION_MS: HistogramVec = register_histogram_vec!(
        "mocksmith_match_duration_ms",
        "Histogram of expectation matching time in milliseconds",
        &["result"],  // result: matched|unmatched
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0]
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record a handled request
pub fn record_request(outcome: &str) {
    REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Helper to record an upsert
pub fn record_expectation_upserted(cause: &str) {
    EXPECTATIONS_UPSERTED_TOTAL.with_label_values(&[cause]).inc();
}

/// Helper to record an exhausted expectation
pub fn record_expectation_exhausted(action: &str) {
    EXPECTATIONS_EXHAUSTED_TOTAL
        .with_label_values(&[action])
        .inc();
}

/// Helper to move the active expectations gauge by one store's change
pub fn adjust_active_expectations(delta: i64) {
    ACTIVE_EXPECTATIONS.add(delta as f64);
}

/// Helper to record matching time
pub fn record_match_duration(matched: bool, duration: Duration) {
    let result = if matched { "matched" } else { "unmatched" };
    MATCH_DURATION_MS
        .with_label_values(&[result])
        .observe(duration.as_secs_f64() * 1000.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        record_request("response");
        record_expectation_upserted("api");
        record_expectation_exhausted("response");
        adjust_active_expectations(0);
        record_match_duration(true, Duration::from_micros(120));

        let metrics = collect_metrics();
        assert!(metrics.contains("mocksmith_requests_total"));
        assert!(metrics.contains("mocksmith_expectations_upserted_total"));
        assert!(metrics.contains("mocksmith_active_expectations"));
        assert!(metrics.contains("mocksmith_match_duration_ms"));
    }
}
