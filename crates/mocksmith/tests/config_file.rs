//! Loading `EngineConfig` from YAML files.

use mocksmith::{EngineConfig, ExpectationStore, Expectation, request};
use std::io::Write;

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "maxExpectations: 1\nmaxLogEntries: 50\ndetailedMatchFailures: false"
    )
    .unwrap();

    let config = EngineConfig::from_file(file.path()).unwrap();
    assert_eq!(config.max_expectations, 1);
    assert_eq!(config.max_log_entries, 50);
    assert!(!config.detailed_match_failures);
    assert_eq!(config.forward_timeout_ms, 30000);

    let store = ExpectationStore::new(&config);
    store.upsert(Expectation::when(request().with_path("/a"))).unwrap();
    store.upsert(Expectation::when(request().with_path("/b"))).unwrap();
    assert_eq!(store.size(), 1);

    let (_, difference) =
        store.first_matching_expectation_with_difference(&request().with_path("/nowhere"));
    assert!(difference.is_none());
}

#[test]
fn test_invalid_file_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "maxExpectations: 0").unwrap();
    let err = EngineConfig::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("maxExpectations"));

    let mut garbage = tempfile::NamedTempFile::new().unwrap();
    writeln!(garbage, "maxLogEntries: [not, a, number]").unwrap();
    assert!(EngineConfig::from_file(garbage.path()).is_err());
}

#[test]
fn test_missing_file() {
    assert!(EngineConfig::from_file("/definitely/not/here.yaml").is_err());
}
