//! Integration tests for the serve-then-refresh snapshots.

use crate::mock_infrastructure::{test_config, unused_url, MockUpstream, StubUpstream, TestApp};
use axum::http::StatusCode;
use futures::future::join_all;
use mockito::Matcher;
use serde_json::json;
use serial_test::serial;
use std::time::{Duration, Instant};

#[tokio::test]
#[serial]
async fn test_concurrent_cold_reads_share_one_refresh() {
    let upstream =
        StubUpstream::fixed(Duration::from_millis(300), json!({ "network_name": "IPPAN DevNet" }))
            .await;
    let app = TestApp::new(test_config(&upstream.url()));

    let responses = join_all((0..50).map(|_| app.get("/v1/status"))).await;

    assert_eq!(upstream.hits(), 1);
    for response in responses {
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json(), json!({ "network_name": "IPPAN DevNet" }));
        assert_eq!(response.header("x-ippan-status-source"), Some("snapshot"));
        assert_eq!(response.header("x-ippan-status-upstream"), Some(upstream.url().as_str()));
    }
}

#[tokio::test]
#[serial]
async fn test_concurrent_cold_reads_share_one_failed_refresh() {
    let upstream = StubUpstream::start(Duration::from_millis(300), |_| {
        (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "overloaded" }))
    })
    .await;
    let app = TestApp::new(test_config(&upstream.url()));

    let responses = join_all((0..50).map(|_| app.get("/v1/status"))).await;

    assert_eq!(upstream.hits(), 1);
    for response in responses {
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.header("x-ippan-status-source"), Some("warming"));
        let body = response.json();
        assert_eq!(body["warming_up"], true);
        assert_eq!(body["hint"], "Status snapshot is initializing; retry in a few seconds.");
    }
}

#[tokio::test]
#[serial]
async fn test_stale_snapshot_served_immediately_while_refreshing() {
    let upstream = StubUpstream::start(Duration::from_millis(300), |hit| {
        (StatusCode::OK, json!({ "seq": hit }))
    })
    .await;
    let mut config = test_config(&upstream.url());
    config.snapshots.status.ttl_ms = 100;
    let app = TestApp::new(config);

    assert_eq!(app.get("/v1/status").await.json(), json!({ "seq": 0 }));
    tokio::time::sleep(Duration::from_millis(150)).await;

    let started = Instant::now();
    let stale = app.get("/v1/status").await;
    assert!(started.elapsed() < Duration::from_millis(200), "stale read must not wait");
    assert_eq!(stale.json(), json!({ "seq": 0 }));
    assert!(stale.header("x-ippan-status-age-ms").is_some());

    // A second stale read does not start another refresh.
    assert_eq!(app.get("/v1/status").await.json(), json!({ "seq": 0 }));
    assert!(upstream.hits() <= 2);

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert_eq!(app.get("/v1/status").await.json(), json!({ "seq": 1 }));
}

#[tokio::test]
#[serial]
async fn test_cold_read_joins_running_refresh() {
    let upstream =
        StubUpstream::fixed(Duration::from_millis(600), json!({ "ippan_time": 42 })).await;
    let mut config = test_config(&upstream.url());
    config.snapshots.status.ttl_ms = 1_000;
    let app = TestApp::new(config);

    let first = app.get("/v1/status");
    let second = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        app.get("/v1/status").await
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.json(), json!({ "ippan_time": 42 }));
    assert_eq!(second.json(), json!({ "ippan_time": 42 }));
    assert_eq!(second.header("x-ippan-status-source"), Some("snapshot"));
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
#[serial]
async fn test_failed_refresh_keeps_previous_snapshot() {
    let upstream = StubUpstream::start(Duration::ZERO, |hit| {
        if hit == 0 {
            (StatusCode::OK, json!({ "nodes": [{ "id": "n1", "status": "online" }] }))
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "overloaded" }))
        }
    })
    .await;
    let mut config = test_config(&upstream.url());
    config.snapshots.nodes.ttl_ms = 50;
    let app = TestApp::new(config);

    let first = app.get("/v1/network/nodes").await;
    assert_eq!(first.json()["nodes"][0]["id"], "n1");

    tokio::time::sleep(Duration::from_millis(80)).await;
    app.get("/v1/network/nodes").await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let after = app.get("/v1/network/nodes").await;
    assert_eq!(after.status, StatusCode::OK);
    assert_eq!(after.json()["nodes"][0]["id"], "n1");
    assert_eq!(after.header("x-ippan-nodes-source"), Some("snapshot"));
    assert!(upstream.hits() >= 2);
}

#[tokio::test]
#[serial]
async fn test_unreachable_primary_yields_warming_marker() {
    let dead = unused_url().await;
    let app = TestApp::new(test_config(&dead));

    let response = app.get("/v1/finality/recent").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("x-ippan-finality-source"), Some("warming"));
    assert_eq!(response.header("cache-control"), Some("no-store"));
    let body = response.json();
    assert_eq!(body["warming_up"], true);
    assert_eq!(body["hint"], "Finality snapshot is initializing; retry in a few seconds.");
}

#[tokio::test]
#[serial]
async fn test_snapshots_only_use_primary_mirror() {
    let dead = unused_url().await;
    let mirror = StubUpstream::fixed(Duration::ZERO, json!({ "ok": true })).await;
    let app = TestApp::new(test_config(&format!("{dead},{}", mirror.url())));

    let response = app.get("/v1/status").await;

    assert_eq!(response.header("x-ippan-status-source"), Some("warming"));
    assert_eq!(mirror.hits(), 0);
}

#[tokio::test]
#[serial]
async fn test_finality_limit_forwarded_and_cache_headers_set() {
    let mut upstream = MockUpstream::new().await;
    let mock = upstream
        .server()
        .mock("GET", "/v1/finality/recent")
        .match_query(Matcher::UrlEncoded("limit".into(), "7".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"rounds":[]}"#)
        .expect(1)
        .create();

    let app = TestApp::new(test_config(&upstream.url()));
    let response = app.get("/v1/finality/recent?limit=7").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_ref(), br#"{"rounds":[]}"#);
    assert_eq!(
        response.header("cache-control"),
        Some("public, s-maxage=2, stale-while-revalidate=10")
    );
    mock.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_status_snapshot_is_never_cached_downstream() {
    let upstream = StubUpstream::fixed(Duration::ZERO, json!({ "health": "ok" })).await;
    let app = TestApp::new(test_config(&upstream.url()));

    let response = app.get("/v1/status").await;

    assert_eq!(
        response.header("cache-control"),
        Some("no-store, no-cache, must-revalidate, max-age=0")
    );
    assert_eq!(response.header("pragma"), Some("no-cache"));
    assert_eq!(response.header("expires"), Some("0"));
}

#[tokio::test]
#[serial]
async fn test_health_reports_snapshot_states() {
    let upstream = StubUpstream::fixed(Duration::ZERO, json!({})).await;
    let app = TestApp::new(test_config(&upstream.url()));

    assert_eq!(app.get("/health").await.json()["snapshots"]["status"], "empty");
    app.get("/v1/status").await;

    let health = app.get("/health").await.json();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["snapshots"]["status"], "fresh");
    assert_eq!(health["snapshots"]["nodes"], "empty");
    assert_eq!(health["snapshots"]["finality"], "empty");
    assert_eq!(health["cache"]["entries"], 0);
    assert_eq!(health["proxy"]["exhausted"], 0);
}
