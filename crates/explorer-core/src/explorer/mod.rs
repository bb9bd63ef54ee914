//! Canonical explorer surface.
//!
//! Each lookup asks the proxy for the `/v1` path first. When that answers 404
//! or 501 and legacy fallback is enabled, the pre-`/v1` path is tried once.
//! The JSON that comes back is run through [`crate::normalize`].
//!
//! List lookups never fail: an unreachable or erroring upstream yields an
//! empty list. Detail lookups distinguish "not found" from upstream failure.

pub mod errors;

use reqwest::{header::HeaderMap, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    config::AppConfig,
    metrics::MetricsCollector,
    normalize::{
        normalize_block_detail, normalize_blocks_list, normalize_checkpoints, normalize_metrics,
        normalize_network_nodes, normalize_replay_status, normalize_round_detail,
        normalize_rounds_list, normalize_search, normalize_status, normalize_tx_detail,
        normalize_tx_list, AuditReplayStatus, BlockDetail, BlocksList, CheckpointsList,
        MetricsResponse, NetworkNodes, RoundDetail, RoundsList, SearchResponse, Status, TxDetail,
        TxList,
    },
    proxy::{ProxyEngine, ProxyRequest},
    snapshot::{SnapshotKind, SnapshotSet},
    types::encode_query_value,
};

pub use errors::ExplorerError;

/// Page size used when the caller gives none.
pub const DEFAULT_LIST_LIMIT: &str = "20";

/// A canonical payload plus the diagnostic headers of the response it came from.
#[derive(Debug, Clone)]
pub struct Canonical<T> {
    pub body: T,
    pub headers: HeaderMap,
}

impl<T> Canonical<T> {
    fn bare(body: T) -> Self {
        Self { body, headers: HeaderMap::new() }
    }
}

/// Pagination parameters of a list lookup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<String>,
    pub cursor: Option<String>,
}

/// Window parameters of a metrics lookup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeriesParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub step: Option<String>,
}

/// Appends the present parameters as a query string.
fn with_query(path: &str, params: &[(&str, Option<&str>)]) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in params {
        if let Some(value) = value {
            query.append_pair(key, value);
            any = true;
        }
    }
    if any {
        format!("{path}?{}", query.finish())
    } else {
        path.to_string()
    }
}

#[allow(clippy::cast_precision_loss)]
fn now_ms() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64
}

pub struct ExplorerService {
    config: Arc<AppConfig>,
    proxy: Arc<ProxyEngine>,
    snapshots: Arc<SnapshotSet>,
    metrics: Arc<MetricsCollector>,
}

impl ExplorerService {
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        proxy: Arc<ProxyEngine>,
        snapshots: Arc<SnapshotSet>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self { config, proxy, snapshots, metrics }
    }

    #[must_use]
    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    #[must_use]
    pub fn proxy(&self) -> &Arc<ProxyEngine> {
        &self.proxy
    }

    #[must_use]
    pub fn snapshots(&self) -> &Arc<SnapshotSet> {
        &self.snapshots
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Upstream path for the recent-transactions shim, with every `{limit}`
    /// placeholder replaced by the encoded limit.
    #[must_use]
    pub fn tx_recent_path(&self, limit: Option<&str>) -> String {
        let limit = encode_query_value(limit.unwrap_or("25"));
        self.config.compat.tx_recent_path.replace("{limit}", &limit)
    }

    /// Fetches `v1_path`, falling back to `legacy_path` on 404 or 501.
    ///
    /// # Errors
    /// [`ExplorerError::NotFound`] on a final 404, [`ExplorerError::UpstreamStatus`]
    /// on any other non-2xx answer, and [`ExplorerError::Upstream`] when no
    /// mirror could be reached.
    pub async fn fetch(
        &self,
        v1_path: &str,
        legacy_path: Option<&str>,
    ) -> Result<(Value, HeaderMap), ExplorerError> {
        let mut response = self.proxy.forward(ProxyRequest::get(v1_path)).await?;

        let unsupported =
            matches!(response.status, StatusCode::NOT_FOUND | StatusCode::NOT_IMPLEMENTED);
        if unsupported && self.config.compat.legacy_fallback {
            if let Some(legacy) = legacy_path {
                debug!(
                    v1_path,
                    legacy,
                    status = response.status.as_u16(),
                    "falling back to legacy path"
                );
                response = self.proxy.forward(ProxyRequest::get(legacy)).await?;
            }
        }

        if response.status == StatusCode::NOT_FOUND {
            return Err(ExplorerError::NotFound);
        }
        if !response.status.is_success() {
            return Err(ExplorerError::UpstreamStatus(response.status.as_u16()));
        }

        Ok((response.json().unwrap_or(Value::Null), response.diagnostic_headers()))
    }

    /// Fetch that degrades to `fallback` on any failure.
    async fn fetch_or<T>(
        &self,
        v1_path: &str,
        legacy_path: &str,
        normalize: impl FnOnce(&Value) -> T,
        fallback: impl FnOnce() -> T,
    ) -> Canonical<T> {
        match self.fetch(v1_path, Some(legacy_path)).await {
            Ok((raw, headers)) => Canonical { body: normalize(&raw), headers },
            Err(e) => {
                warn!(path = v1_path, error = %e, "serving degraded response");
                Canonical::bare(fallback())
            }
        }
    }

    async fn fetch_detail<T>(
        &self,
        v1_path: &str,
        legacy_path: &str,
        normalize: impl FnOnce(&Value) -> T,
    ) -> Result<Canonical<T>, ExplorerError> {
        let (raw, headers) = self.fetch(v1_path, Some(legacy_path)).await?;
        Ok(Canonical { body: normalize(&raw), headers })
    }

    /// Network status through the rotating proxy. Unhealthy defaults when no
    /// mirror answers.
    pub async fn status(&self) -> Canonical<Status> {
        self.fetch_or("/v1/status", "/status", normalize_status, Status::degraded).await
    }

    pub async fn blocks(&self, params: &ListParams) -> Canonical<BlocksList> {
        let (v1, legacy) = list_paths("blocks", "blocks", params);
        self.fetch_or(&v1, &legacy, normalize_blocks_list, BlocksList::default).await
    }

    /// # Errors
    /// See [`ExplorerService::fetch`].
    pub async fn block(&self, id: &str) -> Result<Canonical<BlockDetail>, ExplorerError> {
        let (v1, legacy) = detail_paths("blocks", "blocks", id);
        self.fetch_detail(&v1, &legacy, normalize_block_detail).await
    }

    pub async fn rounds(&self, params: &ListParams) -> Canonical<RoundsList> {
        let (v1, legacy) = list_paths("rounds", "rounds", params);
        self.fetch_or(&v1, &legacy, normalize_rounds_list, RoundsList::default).await
    }

    /// # Errors
    /// See [`ExplorerService::fetch`].
    pub async fn round(&self, id: &str) -> Result<Canonical<RoundDetail>, ExplorerError> {
        let (v1, legacy) = detail_paths("rounds", "rounds", id);
        self.fetch_detail(&v1, &legacy, normalize_round_detail).await
    }

    pub async fn transactions(&self, params: &ListParams) -> Canonical<TxList> {
        let (v1, legacy) = list_paths("transactions", "tx", params);
        self.fetch_or(&v1, &legacy, normalize_tx_list, TxList::default).await
    }

    /// # Errors
    /// See [`ExplorerService::fetch`].
    pub async fn transaction(&self, id: &str) -> Result<Canonical<TxDetail>, ExplorerError> {
        let (v1, legacy) = detail_paths("transactions", "tx", id);
        self.fetch_detail(&v1, &legacy, normalize_tx_detail).await
    }

    pub async fn search(&self, query: &str) -> Canonical<SearchResponse> {
        let params = [("q", Some(query))];
        let v1 = with_query("/v1/search", &params);
        let legacy = with_query("/search", &params);
        self.fetch_or(
            &v1,
            &legacy,
            |raw| normalize_search(raw, query),
            || SearchResponse::empty(query),
        )
        .await
    }

    pub async fn replay_status(&self) -> Canonical<AuditReplayStatus> {
        self.fetch_or(
            "/v1/audit/replay",
            "/audit/status",
            normalize_replay_status,
            AuditReplayStatus::default,
        )
        .await
    }

    pub async fn checkpoints(&self, params: &ListParams) -> Canonical<CheckpointsList> {
        let (v1, legacy) = list_paths("audit/checkpoints", "audit/checkpoints", params);
        self.fetch_or(&v1, &legacy, normalize_checkpoints, CheckpointsList::default).await
    }

    pub async fn metrics_series(&self, params: &SeriesParams) -> Canonical<MetricsResponse> {
        let query = [
            ("from", params.from.as_deref()),
            ("to", params.to.as_deref()),
            ("step", params.step.as_deref()),
        ];
        let v1 = with_query("/v1/metrics/series", &query);
        let legacy = with_query("/metrics", &query);
        let now = now_ms();
        self.fetch_or(&v1, &legacy, |raw| normalize_metrics(raw, now), MetricsResponse::default)
            .await
    }

    /// Node listing from the nodes snapshot; a warming placeholder until the
    /// first successful refresh.
    pub async fn network_nodes(&self) -> Canonical<NetworkNodes> {
        let read = self.snapshots.read_nodes().await;
        let headers = read.diagnostic_headers(SnapshotKind::Nodes);
        let body = match read.snapshot() {
            Some(snapshot) => normalize_network_nodes(&snapshot.json().unwrap_or(Value::Null)),
            None => NetworkNodes::warming(),
        };
        Canonical { body, headers }
    }
}

fn list_paths(v1_resource: &str, legacy_resource: &str, params: &ListParams) -> (String, String) {
    let query = [
        ("limit", Some(params.limit.as_deref().unwrap_or(DEFAULT_LIST_LIMIT))),
        ("cursor", params.cursor.as_deref()),
    ];
    (
        with_query(&format!("/v1/{v1_resource}"), &query),
        with_query(&format!("/{legacy_resource}"), &query),
    )
}

fn detail_paths(v1_resource: &str, legacy_resource: &str, id: &str) -> (String, String) {
    let id = encode_query_value(id);
    (format!("/v1/{v1_resource}/{id}"), format!("/{legacy_resource}/{id}"))
}
