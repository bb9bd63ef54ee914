use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use explorer_core::{
    explorer::{Canonical, ExplorerError, ExplorerService, ListParams, SeriesParams},
    proxy::{ProxyError, ProxyRequest, ProxyResponse},
    snapshot::{SnapshotKind, SnapshotRead},
    types::{HEADER_PROXY, HEADER_PROXY_ATTEMPTS, HEADER_PROXY_UPSTREAMS, PROXY_VERSION},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

pub type AppState = Arc<ExplorerService>;

/// Builds every route of the gateway. Layers are applied by the caller.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .route("/api/ping", get(handle_ping))
        // canonical explorer surface
        .route("/status", get(handle_status))
        .route("/blocks", get(handle_blocks))
        .route("/blocks/{id}", get(handle_block))
        .route("/rounds", get(handle_rounds))
        .route("/rounds/{id}", get(handle_round))
        .route("/transactions", get(handle_transactions))
        .route("/transactions/{id}", get(handle_transaction))
        .route("/search", get(handle_search))
        .route("/audit/replay", get(handle_replay))
        .route("/audit/checkpoints", get(handle_checkpoints))
        .route("/metrics/series", get(handle_metrics_series))
        .route("/network/nodes", get(handle_network_nodes))
        // raw relay
        .route("/v1/status", get(handle_v1_status))
        .route("/v1/finality/recent", get(handle_v1_finality))
        .route("/v1/network/nodes", get(handle_v1_nodes))
        .route("/v1/tx/recent", get(handle_v1_tx_recent))
        .route("/v1/_debug", get(handle_v1_debug))
        .route("/v1/{*path}", any(handle_v1_proxy))
        .with_state(state)
}

/// Error surfaced by a handler, rendered as `{ ok: false, error, ... }`.
#[derive(Debug)]
pub enum ApiError {
    Proxy(ProxyError),
    NotFound,
    UpstreamStatus(u16),
}

impl From<ExplorerError> for ApiError {
    fn from(e: ExplorerError) -> Self {
        match e {
            ExplorerError::NotFound => Self::NotFound,
            ExplorerError::UpstreamStatus(status) => Self::UpstreamStatus(status),
            ExplorerError::Upstream(e) => Self::Proxy(e),
        }
    }
}

impl From<ProxyError> for ApiError {
    fn from(e: ProxyError) -> Self {
        Self::Proxy(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({ "ok": false, "error": "not found" })))
                    .into_response()
            }
            Self::UpstreamStatus(status) => (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "ok": false, "error": format!("Upstream returned HTTP {status}") })),
            )
                .into_response(),
            Self::Proxy(e) => proxy_error_response(&e),
        }
    }
}

fn proxy_error_response(e: &ProxyError) -> Response {
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
    match e {
        ProxyError::NoUpstreamsConfigured => (
            status,
            Json(json!({ "ok": false, "error": e.to_string(), "hint": e.hint() })),
        )
            .into_response(),
        ProxyError::AllAttemptsFailed { attempts, upstreams, detail } => {
            let mut headers = HeaderMap::new();
            headers.insert(
                HeaderName::from_static(HEADER_PROXY),
                HeaderValue::from_static(PROXY_VERSION),
            );
            headers.insert(
                HeaderName::from_static(HEADER_PROXY_ATTEMPTS),
                HeaderValue::from(attempts.len()),
            );
            if let Ok(value) = HeaderValue::from_str(&upstreams.join(",")) {
                headers.insert(HeaderName::from_static(HEADER_PROXY_UPSTREAMS), value);
            }
            let body = json!({
                "ok": false,
                "error": "Proxy upstream failed",
                "detail": detail,
                "hint": e.hint(),
                "attempted": attempts,
            });
            (status, headers, Json(body)).into_response()
        }
    }
}

fn relay(response: ProxyResponse) -> Response {
    (response.status, response.headers, response.body).into_response()
}

fn canonical<T: Serialize>(canonical: Canonical<T>) -> Response {
    (StatusCode::OK, canonical.headers, Json(canonical.body)).into_response()
}

/// `cache-control`, `pragma` and `expires` set so nothing along the way
/// stores the response.
fn no_cache_headers() -> [(HeaderName, HeaderValue); 3] {
    [
        (
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, max-age=0"),
        ),
        (header::PRAGMA, HeaderValue::from_static("no-cache")),
        (header::EXPIRES, HeaderValue::from_static("0")),
    ]
}

// Operational endpoints

pub async fn handle_health(State(explorer): State<AppState>) -> impl IntoResponse {
    let configured = explorer.config().upstreams().len();
    let cache = explorer.proxy().cache().stats();
    let summary = explorer.metrics().get_metrics_summary().await;

    let snapshots: serde_json::Map<String, serde_json::Value> =
        [SnapshotKind::Status, SnapshotKind::Finality, SnapshotKind::Nodes]
            .into_iter()
            .map(|kind| {
                (kind.as_str().to_string(), json!(explorer.snapshots().get(kind).state().as_str()))
            })
            .collect();

    let health_status = json!({
        "status": if configured > 0 { "healthy" } else { "degraded" },
        "upstreams": { "configured": configured },
        "cache": {
            "entries": cache.entries,
            "hits": cache.hits,
            "misses": cache.misses,
            "hit_rate": summary.cache_hit_rate(),
        },
        "proxy": {
            "requests": summary.total_requests,
            "exhausted": summary.exhausted,
        },
        "snapshots": snapshots,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (
        if configured > 0 { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE },
        Json(health_status),
    )
}

pub async fn handle_metrics(State(explorer): State<AppState>) -> Response {
    if !explorer.config().metrics.enabled {
        return ApiError::NotFound.into_response();
    }
    let prometheus_metrics = explorer.metrics().get_prometheus_metrics();

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        prometheus_metrics,
    )
        .into_response()
}

pub async fn handle_ping(State(explorer): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "now": chrono::Utc::now().to_rfc3339(),
        "commit": explorer.config().commit,
    }))
}

// Canonical explorer surface

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn handle_status(State(explorer): State<AppState>) -> Response {
    let status = explorer.status().await;
    (no_cache_headers(), canonical(status)).into_response()
}

pub async fn handle_blocks(
    State(explorer): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    canonical(explorer.blocks(&params).await)
}

pub async fn handle_block(
    State(explorer): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    Ok(canonical(explorer.block(&id).await?))
}

pub async fn handle_rounds(
    State(explorer): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    canonical(explorer.rounds(&params).await)
}

pub async fn handle_round(
    State(explorer): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    Ok(canonical(explorer.round(&id).await?))
}

pub async fn handle_transactions(
    State(explorer): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    canonical(explorer.transactions(&params).await)
}

pub async fn handle_transaction(
    State(explorer): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    Ok(canonical(explorer.transaction(&id).await?))
}

pub async fn handle_search(
    State(explorer): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Response {
    canonical(explorer.search(query.q.trim()).await)
}

pub async fn handle_replay(State(explorer): State<AppState>) -> Response {
    canonical(explorer.replay_status().await)
}

pub async fn handle_checkpoints(
    State(explorer): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    canonical(explorer.checkpoints(&params).await)
}

pub async fn handle_metrics_series(
    State(explorer): State<AppState>,
    Query(params): Query<SeriesParams>,
) -> Response {
    canonical(explorer.metrics_series(&params).await)
}

pub async fn handle_network_nodes(State(explorer): State<AppState>) -> Response {
    canonical(explorer.network_nodes().await)
}

// Raw /v1 relay

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<String>,
}

/// Relays a snapshot read: the stored bytes as-is, or the warming marker.
fn snapshot_response(kind: SnapshotKind, read: &SnapshotRead) -> Response {
    let mut headers = read.diagnostic_headers(kind);

    let cache_control = match (kind, read.is_warming()) {
        (SnapshotKind::Status, _) => None,
        (_, true) => Some("no-store"),
        (SnapshotKind::Finality, false) => Some("public, s-maxage=2, stale-while-revalidate=10"),
        (SnapshotKind::Nodes, false) => Some("public, s-maxage=5, stale-while-revalidate=30"),
    };
    match cache_control {
        Some(value) => {
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(value));
        }
        None => headers.extend(no_cache_headers()),
    }

    match read.snapshot() {
        Some(snapshot) => {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            (StatusCode::OK, headers, snapshot.body.clone()).into_response()
        }
        None => {
            debug!(snapshot = kind.as_str(), "serving warming marker");
            let mut body = json!({ "ok": true, "warming_up": true, "hint": kind.warming_hint() });
            if kind == SnapshotKind::Nodes {
                body["nodes"] = json!([]);
            }
            (StatusCode::OK, headers, Json(body)).into_response()
        }
    }
}

pub async fn handle_v1_status(State(explorer): State<AppState>) -> Response {
    let read = explorer.snapshots().read_status().await;
    snapshot_response(SnapshotKind::Status, &read)
}

pub async fn handle_v1_finality(
    State(explorer): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Response {
    let read = explorer.snapshots().read_finality(query.limit.as_deref()).await;
    snapshot_response(SnapshotKind::Finality, &read)
}

pub async fn handle_v1_nodes(State(explorer): State<AppState>) -> Response {
    let read = explorer.snapshots().read_nodes().await;
    snapshot_response(SnapshotKind::Nodes, &read)
}

pub async fn handle_v1_tx_recent(
    State(explorer): State<AppState>,
    Query(query): Query<LimitQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let request = ProxyRequest {
        method: Method::GET,
        path_and_query: explorer.tx_recent_path(query.limit.as_deref()),
        headers,
        body: None,
    };
    Ok(relay(explorer.proxy().forward(request).await?))
}

pub async fn handle_v1_debug(State(explorer): State<AppState>) -> impl IntoResponse {
    let config = explorer.config();
    Json(json!({
        "ok": true,
        "upstreams": config.upstreams(),
        "timeoutMs": config.upstreams.timeout_ms,
        "retries": config.upstreams.retries,
        "cacheTtlMs": config.cache.ttl_ms,
        "hasProxyKey": config.proxy_key().is_some(),
    }))
}

pub async fn handle_v1_proxy(
    State(explorer): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let path_and_query =
        uri.path_and_query().map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());
    let request = ProxyRequest {
        method,
        path_and_query,
        headers,
        body: (!body.is_empty()).then_some(body),
    };

    explorer.proxy().forward(request).await.map(relay).map_err(|e| {
        warn!(error = %e, "proxy request failed");
        ApiError::from(e)
    })
}
