//! Engine metrics as seen through the global Prometheus registry.

use mocksmith::metrics::{
    collect_metrics, ACTIVE_EXPECTATIONS, EXPECTATIONS_EXHAUSTED_TOTAL,
    EXPECTATIONS_UPSERTED_TOTAL,
};
use mocksmith::{request, Cause, EngineConfig, Expectation, ExpectationStore, Times};
use serial_test::serial;

#[test]
#[serial]
fn test_upsert_and_exhaustion_counters() {
    let upserted_before = EXPECTATIONS_UPSERTED_TOTAL
        .with_label_values(&["initialization"])
        .get();
    let exhausted_before = EXPECTATIONS_EXHAUSTED_TOTAL
        .with_label_values(&["response"])
        .get();

    let store = ExpectationStore::new(&EngineConfig::default());
    store
        .upsert_with_cause(
            Expectation::when(request().with_path("/m")).with_times(Times::once()),
            Cause::Initialization,
        )
        .unwrap();
    assert_eq!(ACTIVE_EXPECTATIONS.get(), 1.0);

    assert!(store.match_request(&request().with_path("/m")).is_some());

    assert_eq!(
        EXPECTATIONS_UPSERTED_TOTAL
            .with_label_values(&["initialization"])
            .get(),
        upserted_before + 1.0
    );
    assert_eq!(
        EXPECTATIONS_EXHAUSTED_TOTAL
            .with_label_values(&["response"])
            .get(),
        exhausted_before + 1.0
    );
    assert_eq!(ACTIVE_EXPECTATIONS.get(), 0.0);
}

#[test]
#[serial]
fn test_collect_metrics_renders_text() {
    let store = ExpectationStore::new(&EngineConfig::default());
    store.upsert(Expectation::when(request().with_path("/x"))).unwrap();
    store.match_request(&request().with_path("/x"));

    let text = collect_metrics();
    assert!(text.contains("mocksmith_expectations_upserted_total"));
    assert!(text.contains("mocksmith_match_duration_ms"));
}

#[test]
#[serial]
fn test_active_gauge_sums_stores() {
    let first = ExpectationStore::new(&EngineConfig::default());
    let second = ExpectationStore::new(&EngineConfig::default());
    first.upsert(Expectation::when(request().with_path("/a"))).unwrap();
    first.upsert(Expectation::when(request().with_path("/b"))).unwrap();
    second.upsert(Expectation::when(request().with_path("/c"))).unwrap();
    assert_eq!(ACTIVE_EXPECTATIONS.get(), 3.0);

    second.reset();
    assert_eq!(ACTIVE_EXPECTATIONS.get(), 2.0);

    drop(first);
    assert_eq!(ACTIVE_EXPECTATIONS.get(), 0.0);
}
