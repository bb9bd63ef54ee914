//! Integration tests for the raw `/v1` relay.
//!
//! These go through the full router, so they cover the proxy engine, the
//! ephemeral cache and the error rendering together.

use crate::mock_infrastructure::{test_config, unused_url, BlackHole, MockUpstream, TestApp};
use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
};
use explorer_core::proxy::ProxyRequest;
use mockito::Matcher;
use serde_json::json;
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn test_rotates_to_next_mirror_after_transport_failure() {
    let dead = unused_url().await;
    let mut upstream = MockUpstream::new().await;
    upstream.mock_json("GET", "/v1/blocks", 200, &json!({ "blocks": [] }));

    let app = TestApp::new(test_config(&format!("{dead},{}", upstream.url())));
    let response = app.get("/v1/blocks?limit=5").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("x-ippan-proxy-upstream"), Some(upstream.url().as_str()));
    assert_eq!(response.header("x-ippan-proxy"), Some("v1"));
    assert_eq!(response.header("x-ippan-proxy-cache"), Some("MISS"));
    assert_eq!(response.header("x-ippan-proxy-attempts"), Some("2"));
    assert_eq!(response.json(), json!({ "blocks": [] }));
}

#[tokio::test]
#[serial]
async fn test_attempt_log_counts_timed_out_mirrors_before_success() {
    let first = BlackHole::start().await;
    let second = BlackHole::start().await;
    let mut upstream = MockUpstream::new().await;
    upstream.mock_json("GET", "/v1/rounds", 200, &json!({ "rounds": [] }));

    let mut config = test_config(&format!("{},{},{}", first.url(), second.url(), upstream.url()));
    config.upstreams.timeout_ms = 200;
    config.upstreams.retries = 2;
    let app = TestApp::new(config);

    let response = app.get("/v1/rounds?limit=1").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("x-ippan-proxy-attempts"), Some("3"));
    assert_eq!(response.header("x-ippan-proxy-upstream"), Some(upstream.url().as_str()));

    let forwarded = app
        .explorer
        .proxy()
        .forward(ProxyRequest::get("/v1/rounds?limit=2"))
        .await
        .expect("forwarded");
    assert_eq!(forwarded.attempt_count(), 3);
    assert_eq!(forwarded.failed_attempts.len(), 2);
    assert_eq!(forwarded.failed_attempts[0].upstream, first.url());
    assert_eq!(forwarded.failed_attempts[1].upstream, second.url());
    assert!(forwarded.failed_attempts.iter().all(|a| a.err.starts_with("TIMEOUT")));

    let cached = app.get("/v1/rounds?limit=1").await;
    assert_eq!(cached.header("x-ippan-proxy-cache"), Some("HIT"));
    assert!(cached.header("x-ippan-proxy-attempts").is_none());
}

#[tokio::test]
#[serial]
async fn test_exhaustion_reports_every_attempt_in_rotation_order() {
    let first = unused_url().await;
    let second = unused_url().await;

    let app = TestApp::new(test_config(&format!("{first},{second}")));
    let response = app.get("/v1/rounds").await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.header("x-ippan-proxy-attempts"), Some("3"));
    assert_eq!(
        response.header("x-ippan-proxy-upstreams"),
        Some(format!("{first},{second}").as_str())
    );

    let body = response.json();
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "Proxy upstream failed");
    assert!(body["hint"].is_string());

    let attempted = body["attempted"].as_array().expect("attempted array");
    assert_eq!(attempted.len(), 3);
    assert_eq!(attempted[0]["upstream"], first.as_str());
    assert_eq!(attempted[1]["upstream"], second.as_str());
    assert_eq!(attempted[2]["upstream"], first.as_str());
    assert_eq!(attempted[0]["url"], format!("{first}/v1/rounds"));
    assert_eq!(attempted[0]["method"], "GET");
    assert!(attempted[0]["err"].as_str().expect("err").starts_with("NETWORK_ERROR"));
}

#[tokio::test]
#[serial]
async fn test_timeout_is_reported_as_timeout() {
    let hole = BlackHole::start().await;
    let mut config = test_config(&hole.url());
    config.upstreams.timeout_ms = 200;
    config.upstreams.retries = 0;

    let app = TestApp::new(config);
    let started = std::time::Instant::now();
    let response = app.get("/v1/status/extended").await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert!(started.elapsed() < Duration::from_secs(2));

    let body = response.json();
    assert_eq!(body["attempted"].as_array().map(Vec::len), Some(1));
    assert!(body["detail"].as_str().expect("detail").starts_with("TIMEOUT"));
    assert!(body["attempted"][0]["ms"].as_u64().expect("ms") >= 150);
}

#[tokio::test]
#[serial]
async fn test_upstream_error_status_is_relayed_without_retry() {
    let mut primary = MockUpstream::new().await;
    let mut secondary = MockUpstream::new().await;
    let failing = primary.expect_json("GET", "/v1/blocks/abc", 500, &json!({ "error": "boom" }), 1);
    let untouched = secondary.expect_json("GET", "/v1/blocks/abc", 200, &json!({}), 0);

    let app = TestApp::new(test_config(&format!("{},{}", primary.url(), secondary.url())));
    let response = app.get("/v1/blocks/abc").await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json(), json!({ "error": "boom" }));
    assert_eq!(response.header("x-ippan-proxy-upstream"), Some(primary.url().as_str()));

    failing.assert_async().await;
    untouched.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_not_found_is_relayed_without_trying_mirror() {
    let mut primary = MockUpstream::new().await;
    let mut secondary = MockUpstream::new().await;
    let missing = primary.expect_json("GET", "/v1/rounds/9", 404, &json!({ "error": "nope" }), 1);
    let untouched = secondary.expect_json("GET", "/v1/rounds/9", 200, &json!({}), 0);

    let app = TestApp::new(test_config(&format!("{},{}", primary.url(), secondary.url())));
    let response = app.get("/v1/rounds/9").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.header("x-ippan-proxy-cache"), Some("MISS"));
    missing.assert_async().await;
    untouched.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_cache_hit_within_ttl_then_miss_after_expiry() {
    let mut upstream = MockUpstream::new().await;
    let mock =
        upstream.expect_json("GET", "/v1/transactions", 200, &json!({ "transactions": [] }), 2);

    let mut config = test_config(&upstream.url());
    config.cache.ttl_ms = 300;
    let app = TestApp::new(config);

    let first = app.get("/v1/transactions?limit=3").await;
    assert_eq!(first.header("x-ippan-proxy-cache"), Some("MISS"));

    let second = app.get("/v1/transactions?limit=3").await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.header("x-ippan-proxy-cache"), Some("HIT"));
    assert_eq!(second.header("x-ippan-proxy-ms"), Some("0"));
    assert_eq!(second.body, first.body);

    tokio::time::sleep(Duration::from_millis(400)).await;
    let third = app.get("/v1/transactions?limit=3").await;
    assert_eq!(third.header("x-ippan-proxy-cache"), Some("MISS"));

    mock.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_cache_key_includes_query() {
    let mut upstream = MockUpstream::new().await;
    let mock = upstream.expect_json("GET", "/v1/rounds", 200, &json!([]), 2);

    let app = TestApp::new(test_config(&upstream.url()));
    app.get("/v1/rounds?limit=1").await;
    let other = app.get("/v1/rounds?limit=2").await;

    assert_eq!(other.header("x-ippan-proxy-cache"), Some("MISS"));
    mock.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_non_success_and_post_are_never_cached() {
    let mut upstream = MockUpstream::new().await;
    let missing = upstream.expect_json("GET", "/v1/blocks/nope", 404, &json!({}), 2);
    let submit = upstream.expect_json("POST", "/v1/tx", 202, &json!({ "accepted": true }), 2);

    let app = TestApp::new(test_config(&upstream.url()));
    for _ in 0..2 {
        assert_eq!(app.get("/v1/blocks/nope").await.status, StatusCode::NOT_FOUND);

        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        let response =
            app.send(Method::POST, "/v1/tx", headers, Body::from(r#"{"amount":1}"#)).await;
        assert_eq!(response.status, StatusCode::ACCEPTED);
        assert_eq!(response.header("x-ippan-proxy-cache"), Some("MISS"));
    }

    missing.assert_async().await;
    submit.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_post_body_and_content_type_are_forwarded() {
    let mut upstream = MockUpstream::new().await;
    let mock = upstream
        .server()
        .mock("POST", "/v1/tx")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({ "amount": 5 })))
        .with_status(200)
        .with_body("{}")
        .create();

    let app = TestApp::new(test_config(&upstream.url()));
    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    let response = app.send(Method::POST, "/v1/tx", headers, Body::from(r#"{"amount":5}"#)).await;

    assert_eq!(response.status, StatusCode::OK);
    mock.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_private_headers_stripped_and_key_attached() {
    let mut upstream = MockUpstream::new().await;
    let mock = upstream
        .server()
        .mock("GET", "/v1/peers")
        .match_header("x-ippan-explorer-key", "s3cret")
        .match_header("authorization", Matcher::Missing)
        .match_header("cookie", Matcher::Missing)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("set-cookie", "session=leak")
        .with_header("x-ippan-node", "node-7")
        .with_body("[]")
        .create();

    let mut config = test_config(&upstream.url());
    config.upstreams.proxy_key = "s3cret".to_string();
    let app = TestApp::new(config);

    let mut headers = HeaderMap::new();
    headers.insert("authorization", HeaderValue::from_static("Bearer user-token"));
    headers.insert("cookie", HeaderValue::from_static("session=abc"));
    let response = app.send(Method::GET, "/v1/peers", headers, Body::empty()).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("x-ippan-node"), Some("node-7"));
    assert!(response.header("set-cookie").is_none());
    assert_eq!(
        response.header("cache-control"),
        Some("public, s-maxage=1, stale-while-revalidate=4")
    );
    mock.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_engine_forward_directly() {
    let mut upstream = MockUpstream::new().await;
    upstream.mock_json("GET", "/v1/audit/checkpoints", 200, &json!({ "checkpoints": [] }));

    let app = TestApp::new(test_config(&upstream.url()));
    let response = app
        .explorer
        .proxy()
        .forward(ProxyRequest::get("/v1/audit/checkpoints?limit=1"))
        .await
        .expect("forwarded");

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.upstream, upstream.url());
    assert_eq!(response.json(), Some(json!({ "checkpoints": [] })));
    assert_eq!(app.explorer.proxy().cache().len(), 1);
}
