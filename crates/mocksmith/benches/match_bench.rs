use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mocksmith::model::Body;
use mocksmith::{request, response, string, EngineConfig, Expectation, ExpectationStore};
use serde_json::json;

fn populate(count: usize, regex: bool) -> ExpectationStore {
    let config = EngineConfig {
        max_expectations: count.max(1),
        ..EngineConfig::default()
    };
    let store = ExpectationStore::new(&config);
    for i in 0..count {
        let path = if regex {
            format!("/api/v\\d+/endpoint{i}")
        } else {
            format!("/api/v1/endpoint{i}")
        };
        store
            .upsert(
                Expectation::when(
                    request()
                        .with_method("GET")
                        .with_path(path)
                        .with_header("Accept", "application/json"),
                )
                .with_priority((count - i) as i32)
                .then_respond(response().with_status_code(200)),
            )
            .unwrap();
    }
    store
}

fn bench_match_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_request");

    for count in [10, 100, 1000].iter() {
        let store = populate(*count, false);
        let first = request()
            .with_method("GET")
            .with_path("/api/v1/endpoint0")
            .with_header("Accept", "application/json");
        let last = request()
            .with_method("GET")
            .with_path(format!("/api/v1/endpoint{}", count - 1))
            .with_header("Accept", "application/json");
        let miss = request().with_method("GET").with_path("/nowhere");

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("match_first", count), count, |b, _| {
            b.iter(|| store.match_request(black_box(&first)))
        });
        group.bench_with_input(BenchmarkId::new("match_last", count), count, |b, _| {
            b.iter(|| store.match_request(black_box(&last)))
        });
        group.bench_with_input(BenchmarkId::new("no_match", count), count, |b, _| {
            b.iter(|| store.match_request(black_box(&miss)))
        });
        group.bench_with_input(BenchmarkId::new("no_match_diagnosed", count), count, |b, _| {
            b.iter(|| store.first_matching_expectation_with_difference(black_box(&miss)))
        });
    }

    group.finish();
}

fn bench_regex_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("regex_paths");

    for count in [10, 100].iter() {
        let store = populate(*count, true);
        let last = request()
            .with_method("GET")
            .with_path(format!("/api/v2/endpoint{}", count - 1))
            .with_header("Accept", "application/json");

        group.bench_with_input(BenchmarkId::new("match_last", count), count, |b, _| {
            b.iter(|| store.match_request(black_box(&last)))
        });
    }

    group.finish();
}

fn bench_json_body(c: &mut Criterion) {
    let store = ExpectationStore::new(&EngineConfig::default());
    store
        .upsert(Expectation::when(
            request()
                .with_method("POST")
                .with_query_string_parameter("tenant", [string("[a-z]+")])
                .with_body(Body::json(json!({"id": 1, "name": "door"}))),
        ))
        .unwrap();
    let matching = request()
        .with_method("POST")
        .with_query_string_parameter("tenant", [string("acme")])
        .with_body(Body::exact(r#"{"id":1,"name":"door","price":12.5,"tags":["a","b"]}"#));

    c.bench_function("json_body_only_matching_fields", |b| {
        b.iter(|| store.match_request(black_box(&matching)))
    });
}

criterion_group!(benches, bench_match_request, bench_regex_paths, bench_json_body);
criterion_main!(benches);
