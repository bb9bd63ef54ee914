//! Integration tests for the canonical explorer routes.

use crate::mock_infrastructure::{
    test_config, unused_url, BlackHole, MockUpstream, StubUpstream, TestApp,
};
use axum::http::StatusCode;
use mockito::Matcher;
use serde_json::{json, Value};
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn test_status_normalized_through_proxy() {
    let mut upstream = MockUpstream::new().await;
    upstream.mock_json(
        "GET",
        "/v1/status",
        200,
        &json!({
            "network_id": "devnet-1",
            "status": "OK",
            "head_round": 812,
            "head_block": "b-812",
            "tps": { "accepted": 41.5, "finalized": 40 },
            "validators": 4,
            "replay_status": "verified"
        }),
    );

    let app = TestApp::new(test_config(&upstream.url()));
    let response = app.get("/status").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("x-ippan-proxy-upstream"), Some(upstream.url().as_str()));
    assert_eq!(
        response.header("cache-control"),
        Some("no-store, no-cache, must-revalidate, max-age=0")
    );

    let body = response.json();
    assert_eq!(body["network_id"], "devnet-1");
    assert_eq!(body["network_name"], "IPPAN DevNet");
    assert_eq!(body["health"], "healthy");
    assert_eq!(body["latest_round_id"], 812);
    assert_eq!(body["latest_block_id"], "b-812");
    assert_eq!(body["accepted_tps"], 41.5);
    assert_eq!(body["finalized_tps"], 40.0);
    assert_eq!(body["active_validators"], 4);
    assert_eq!(body["replay_status"], "pass");
}

#[tokio::test]
#[serial]
async fn test_status_rotates_to_mirror() {
    let dead = unused_url().await;
    let mirror = StubUpstream::fixed(Duration::ZERO, json!({ "health": "degraded" })).await;

    let app = TestApp::new(test_config(&format!("{dead},{}", mirror.url())));
    let body = app.get("/status").await.json();

    assert_eq!(body["health"], "degraded");
    assert_eq!(mirror.hits(), 1);
}

#[tokio::test]
#[serial]
async fn test_status_served_by_mirror_after_primary_timeout() {
    let hole = BlackHole::start().await;
    let mirror =
        StubUpstream::fixed(Duration::ZERO, json!({ "status": "ok", "validators": 4 })).await;
    let mut config = test_config(&format!("{},{}", hole.url(), mirror.url()));
    config.upstreams.timeout_ms = 200;
    let app = TestApp::new(config);

    let response = app.get("/status").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("x-ippan-proxy-upstream"), Some(mirror.url().as_str()));
    let body = response.json();
    assert_eq!(body["health"], "healthy");
    assert_eq!(body["active_validators"], 4);
}

#[tokio::test]
#[serial]
async fn test_blocks_fall_back_to_legacy_path() {
    let mut upstream = MockUpstream::new().await;
    upstream.mock_not_found("/v1/blocks").mock_json(
        "GET",
        "/blocks",
        200,
        &json!([
            {
                "hash": "0xabc",
                "round": 7,
                "parents": ["0x1", "0x2"],
                "transactions": [{}, {}, {}]
            },
            { "id": "0xdef", "tx_count": "4", "finalized": true }
        ]),
    );

    let app = TestApp::new(test_config(&upstream.url()));
    let body = app.get("/blocks?limit=2").await.json();

    let blocks = body["blocks"].as_array().expect("blocks");
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0]["block_id"], "0xabc");
    assert_eq!(blocks[0]["round_id"], 7);
    assert_eq!(blocks[0]["parent_count"], 2);
    assert_eq!(blocks[0]["tx_count"], 3);
    assert_eq!(blocks[1]["tx_count"], 4);
    assert_eq!(blocks[1]["finalized"], true);
}

#[tokio::test]
#[serial]
async fn test_list_query_forwarded_to_upstream() {
    let mut upstream = MockUpstream::new().await;
    let mock = upstream
        .server()
        .mock("GET", "/v1/rounds")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("limit".into(), "5".into()),
            Matcher::UrlEncoded("cursor".into(), "r/10".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"rounds":[],"next_cursor":"r/5","has_more":true}"#)
        .expect(1)
        .create();

    let app = TestApp::new(test_config(&upstream.url()));
    let body = app.get("/rounds?limit=5&cursor=r%2F10").await.json();

    assert_eq!(body["rounds"], json!([]));
    assert_eq!(body["has_more"], true);
    mock.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_block_detail_not_found_on_both_paths() {
    let mut upstream = MockUpstream::new().await;
    upstream.mock_not_found("/v1/blocks/missing").mock_not_found("/blocks/missing");

    let app = TestApp::new(test_config(&upstream.url()));
    let response = app.get("/blocks/missing").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json(), json!({ "ok": false, "error": "not found" }));
}

#[tokio::test]
#[serial]
async fn test_detail_upstream_error_maps_to_bad_gateway() {
    let mut upstream = MockUpstream::new().await;
    upstream.mock_json("GET", "/v1/transactions/t1", 503, &json!({ "error": "busy" }));

    let app = TestApp::new(test_config(&upstream.url()));
    let response = app.get("/transactions/t1").await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.json()["error"], "Upstream returned HTTP 503");
}

#[tokio::test]
#[serial]
async fn test_transaction_detail_uses_legacy_tx_path() {
    let mut upstream = MockUpstream::new().await;
    upstream.mock_not_found("/v1/transactions/t9").mock_json(
        "GET",
        "/tx/t9",
        200,
        &json!({ "hash": "t9", "type": "transfer", "finalized": true, "from": "alice" }),
    );

    let app = TestApp::new(test_config(&upstream.url()));
    let response = app.get("/transactions/t9").await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["tx_id"], "t9");
    assert_eq!(body["type"], "transfer");
    assert_eq!(body["finalized"], true);
    assert_eq!(body["sender"], "alice");
}

#[tokio::test]
#[serial]
async fn test_round_detail() {
    let mut upstream = MockUpstream::new().await;
    upstream.mock_json(
        "GET",
        "/v1/rounds/42",
        200,
        &json!({ "round_id": 42, "status": "finalized", "participants": ["v1", "v2"] }),
    );

    let app = TestApp::new(test_config(&upstream.url()));
    let body = app.get("/rounds/42").await.json();

    assert_eq!(body["round_id"], 42);
    assert_eq!(body["status"], "finalized");
    assert_eq!(body["participants"][1]["node_id"], "v2");
}

#[tokio::test]
#[serial]
async fn test_search_detects_type_and_normalizes_hits() {
    let mut upstream = MockUpstream::new().await;
    let mock = upstream
        .server()
        .mock("GET", "/v1/search")
        .match_query(Matcher::UrlEncoded("q".into(), "12".into()))
        .with_status(200)
        .with_body(r#"[{"type":"round","id":"12"}]"#)
        .create();

    let app = TestApp::new(test_config(&upstream.url()));
    let body = app.get("/search?q=%2012%20").await.json();

    assert_eq!(body["query"], "12");
    assert_eq!(body["detected_type"], "round");
    assert_eq!(body["hits"][0]["type"], "round");
    assert_eq!(body["hits"][0]["id"], "12");
    mock.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_network_nodes_from_snapshot() {
    let mut upstream = MockUpstream::new().await;
    upstream.mock_json(
        "GET",
        "/v1/network/nodes",
        200,
        &json!([
            { "id": "v1", "role": "validator", "status": "online", "uptime": 9950 },
            { "id": "v2", "role": "validator", "is_connected": false },
            { "id": "o1", "role": "observer", "status": "syncing" }
        ]),
    );

    let app = TestApp::new(test_config(&upstream.url()));
    let response = app.get("/network/nodes").await;

    assert_eq!(response.header("x-ippan-nodes-source"), Some("snapshot"));
    let body = response.json();
    assert_eq!(body["total_nodes"], 3);
    assert_eq!(body["online_nodes"], 2);
    assert_eq!(body["nodes"][0]["uptime_percent"], 99.5);
    assert_eq!(body["nodes"][1]["status"], "offline");
    assert_eq!(body["nodes"][2]["role"], "observer");
    assert!(body.get("warming_up").is_none());
}

#[tokio::test]
#[serial]
async fn test_network_nodes_warming_placeholder() {
    let app = TestApp::new(test_config(&unused_url().await));
    let response = app.get("/network/nodes").await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["warming_up"], true);
    assert_eq!(body["nodes"], json!([]));
    assert_eq!(body["total_nodes"], 0);
}

#[tokio::test]
#[serial]
async fn test_tx_recent_uses_configured_path() {
    let mut upstream = MockUpstream::new().await;
    let mock = upstream
        .server()
        .mock("GET", "/v1/tx/latest")
        .match_query(Matcher::UrlEncoded("n".into(), "5".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .expect(1)
        .create();

    let mut config = test_config(&upstream.url());
    config.compat.tx_recent_path = "/v1/tx/latest?n={limit}".to_string();
    let app = TestApp::new(config);
    let response = app.get("/v1/tx/recent?limit=5").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_ref(), b"[]");
    mock.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_garbage_upstream_degrades_every_list() {
    let mut upstream = MockUpstream::new().await;
    for path in [
        "/v1/blocks",
        "/v1/rounds",
        "/v1/transactions",
        "/v1/audit/checkpoints",
        "/v1/audit/replay",
        "/v1/metrics/series",
    ] {
        upstream
            .server()
            .mock("GET", path)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>oops</html>")
            .create();
    }

    let app = TestApp::new(test_config(&upstream.url()));

    let expectations: [(&str, Value); 6] = [
        ("/blocks", json!({ "blocks": [], "has_more": false })),
        ("/rounds", json!({ "rounds": [], "has_more": false })),
        ("/transactions", json!({ "transactions": [], "has_more": false })),
        ("/audit/checkpoints", json!({ "checkpoints": [], "has_more": false })),
        ("/audit/replay", json!({ "status": "unavailable" })),
        ("/metrics/series", json!({ "series": [] })),
    ];
    for (uri, expected) in expectations {
        let response = app.get(uri).await;
        assert_eq!(response.status, StatusCode::OK, "{uri}");
        assert_eq!(response.json(), expected, "{uri}");
    }
}

#[tokio::test]
#[serial]
async fn test_legacy_fallback_can_be_disabled() {
    let mut upstream = MockUpstream::new().await;
    upstream.mock_not_found("/v1/blocks/b1");
    let legacy = upstream.expect_json("GET", "/blocks/b1", 200, &json!({ "hash": "b1" }), 0);

    let mut config = test_config(&upstream.url());
    config.compat.legacy_fallback = false;
    let app = TestApp::new(config);

    assert_eq!(app.get("/blocks/b1").await.status, StatusCode::NOT_FOUND);
    legacy.assert_async().await;
}
