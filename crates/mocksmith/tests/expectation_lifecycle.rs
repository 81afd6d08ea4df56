//! End-to-end behaviour of expectations through `HttpState`: selection order,
//! lifecycle, clearing and retrieval.

use async_trait::async_trait;
use mocksmith::action::{CallbackRegistry, HttpForwarder, TemplateEngines};
use mocksmith::model::{
    Body, HttpForward, MatchType, Scheme, TimeUnit,
};
use mocksmith::store::ExpectationState;
use mocksmith::{
    not, request, response, ClearType, EngineConfig, Expectation, HandleOutcome, HttpRequest,
    HttpResponse, HttpState, TimeToLive, Times,
};
use serde_json::json;
use std::sync::Arc;

/// Answers every forwarded request with `200 upstream`.
struct UpstreamStub;

#[async_trait]
impl HttpForwarder for UpstreamStub {
    async fn forward(&self, _: &HttpRequest, _: &HttpForward) -> anyhow::Result<HttpResponse> {
        Ok(response().with_status_code(200).with_body(Body::exact("upstream")))
    }
}

fn state() -> HttpState {
    HttpState::with_collaborators(
        EngineConfig::default(),
        Arc::new(UpstreamStub),
        TemplateEngines::default(),
        Arc::new(CallbackRegistry::new()),
    )
}

fn status(outcome: &HandleOutcome) -> u16 {
    outcome.response().map(HttpResponse::status).unwrap_or(0)
}

#[tokio::test]
async fn test_priority_selects_higher() {
    let state = state();
    let matcher = request().with_path("/p");
    state
        .upsert(Expectation::when(matcher.clone()).then_respond(response().with_status_code(200)).with_priority(10))
        .unwrap();
    state
        .upsert(Expectation::when(matcher).then_respond(response().with_status_code(201)))
        .unwrap();

    for _ in 0..3 {
        assert_eq!(status(&state.handle(&request().with_path("/p")).await), 200);
    }
}

#[tokio::test]
async fn test_recency_breaks_ties() {
    let state = state();
    let matcher = request().with_path("/p");
    state
        .upsert(Expectation::when(matcher.clone()).then_respond(response().with_status_code(200)))
        .unwrap();
    state
        .upsert(Expectation::when(matcher).then_respond(response().with_status_code(201)))
        .unwrap();

    assert_eq!(status(&state.handle(&request().with_path("/p")).await), 201);
}

#[tokio::test]
async fn test_zero_ttl_is_immediately_expired() {
    let state = state();
    let id = state
        .upsert(
            Expectation::when(request().with_path("/ttl"))
                .with_time_to_live(TimeToLive::exactly(TimeUnit::Seconds, 0)),
        )
        .unwrap();

    let outcome = state.handle(&request().with_path("/ttl")).await;
    assert!(matches!(outcome, HandleOutcome::NotFound { .. }));
    assert_eq!(state.store().state(&id), Some(ExpectationState::Expired));
}

#[tokio::test]
async fn test_not_accept_header() {
    let state = state();
    state
        .upsert(Expectation::when(
            request().with_path("/some/path").with_header_name(not("Accept")),
        ))
        .unwrap();

    let with_accept = request()
        .with_path("/some/path")
        .with_header("Accept", "text/html");
    assert_eq!(status(&state.handle(&with_accept).await), 404);
    assert_eq!(status(&state.handle(&request().with_path("/some/path")).await), 200);
}

#[tokio::test]
async fn test_json_only_matching_fields() {
    let state = state();
    state
        .upsert(Expectation::when(request().with_body(Body::json_with(
            json!({"id": 1, "name": "door"}),
            MatchType::OnlyMatchingFields,
        ))))
        .unwrap();

    let superset = request().with_body(Body::exact(r#"{"id":1,"name":"door","price":12.5}"#));
    let mismatch = request().with_body(Body::exact(r#"{"id":2,"name":"door"}"#));
    assert_eq!(status(&state.handle(&superset).await), 200);
    assert_eq!(status(&state.handle(&mismatch).await), 404);
}

#[tokio::test]
async fn test_round_trip_retrieve() {
    let state = state();
    let expectation = Expectation::when(request().with_method("GET").with_path("/rt"))
        .with_priority(3)
        .with_times(Times::exactly(4))
        .then_respond(response().with_status_code(204));
    let id = state.upsert(expectation.clone()).unwrap();

    let active = state.retrieve_active_expectations(None);
    assert_eq!(active, vec![expectation.with_id(id)]);
}

#[tokio::test]
async fn test_clear_request_one_only() {
    let state = state();
    state.upsert(Expectation::when(request().with_path("request_one"))).unwrap();
    state.upsert(Expectation::when(request().with_path("request_two"))).unwrap();
    state.handle(&request().with_path("request_one")).await;
    state.handle(&request().with_path("request_two")).await;

    state.clear(Some(&request().with_path("request_one")), ClearType::All);

    assert_eq!(
        state.retrieve_requests(None),
        vec![request().with_path("request_two")]
    );
    let remaining = state.retrieve_active_expectations(None);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].http_request.path_str(), "request_two");
}

#[tokio::test]
async fn test_clear_log_keeps_expectations() {
    let state = state();
    state.upsert(Expectation::when(request().with_path("/a"))).unwrap();
    state.handle(&request().with_path("/a")).await;

    state.clear(None, ClearType::Log);
    assert!(state.retrieve_requests(None).is_empty());
    assert_eq!(state.retrieve_active_expectations(None).len(), 1);

    state.reset();
    assert!(state.retrieve_active_expectations(None).is_empty());
}

#[tokio::test]
async fn test_forward_is_recorded() {
    let state = state();
    state
        .upsert(
            Expectation::when(request().with_path("/proxy"))
                .then_forward(HttpForward::new("upstream", 8080, Scheme::Http)),
        )
        .unwrap();

    let outcome = state.handle(&request().with_path("/proxy")).await;
    assert_eq!(outcome.response().and_then(|r| r.body.as_ref()).map(Body::as_string), Some("upstream".to_string()));

    let recorded = state.retrieve_recorded_expectations(None);
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].http_request.path_str(), "/proxy");
    assert_eq!(recorded[0].times, Times::once());
}

#[tokio::test]
async fn test_unmatched_reports_difference() {
    let state = state();
    state
        .upsert(Expectation::when(request().with_method("POST").with_path("/d")).with_id("post-d"))
        .unwrap();

    let HandleOutcome::NotFound { response, difference } =
        state.handle(&request().with_method("GET").with_path("/d")).await
    else {
        panic!("expected no match");
    };
    assert_eq!(response.status(), 404);
    let difference = difference.unwrap();
    assert_eq!(difference.expectation_id(), Some("post-d"));
    assert!(difference.to_string().contains("method"));
}

#[tokio::test]
async fn test_error_action() {
    let state = state();
    state
        .upsert_json(&json!({
            "httpRequest": {"path": "/drop"},
            "httpError": {"dropConnection": true}
        }))
        .unwrap();

    let outcome = state.handle(&request().with_path("/drop")).await;
    let HandleOutcome::Error(error) = outcome else {
        panic!("expected error action");
    };
    assert_eq!(error.drop_connection, Some(true));
}

#[tokio::test]
async fn test_missing_callback_degrades_to_not_found() {
    let state = state();
    state
        .upsert_json(&json!({
            "httpRequest": {"path": "/cb"},
            "httpClassCallback": {"callbackClass": "org.example.Missing"}
        }))
        .unwrap();

    assert_eq!(status(&state.handle(&request().with_path("/cb")).await), 404);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_use_expectation_fires_once() {
    for _ in 0..20 {
        let state = Arc::new(state());
        let id = state
            .upsert(Expectation::when(request().with_path("/once")).with_times(Times::once()))
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = Arc::clone(&state);
                tokio::spawn(async move { state.handle(&request().with_path("/once")).await })
            })
            .collect();

        let mut matched = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), HandleOutcome::Responded(_)) {
                matched += 1;
            }
        }
        assert_eq!(matched, 1);
        assert_eq!(state.store().state(&id), Some(ExpectationState::Exhausted));
    }
}

#[test]
fn test_handle_from_blocking_context() {
    let state = state();
    state
        .upsert(Expectation::when(request().with_path("/sync")).then_respond(response().with_status_code(202)))
        .unwrap();
    let outcome = tokio_test::block_on(state.handle(&request().with_path("/sync")));
    assert_eq!(status(&outcome), 202);
}
