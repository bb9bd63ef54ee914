use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    config::{AppConfig, SnapshotConfig},
    metrics::MetricsCollector,
    types::HEADER_EXPLORER_KEY,
    upstream::{FetchRequest, HttpClient},
};

/// The guarded endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    Status,
    Finality,
    Nodes,
}

impl SnapshotKind {
    /// Label used in metrics, logs and the health report.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Finality => "finality",
            Self::Nodes => "nodes",
        }
    }

    /// Hint shown in the warming-up marker.
    #[must_use]
    pub fn warming_hint(self) -> &'static str {
        match self {
            Self::Status => "Status snapshot is initializing; retry in a few seconds.",
            Self::Finality => "Finality snapshot is initializing; retry in a few seconds.",
            Self::Nodes => "Network nodes data unavailable; upstream may be down.",
        }
    }

    /// `x-ippan-<kind>-source`
    #[must_use]
    pub fn source_header(self) -> &'static str {
        match self {
            Self::Status => "x-ippan-status-source",
            Self::Finality => "x-ippan-finality-source",
            Self::Nodes => "x-ippan-nodes-source",
        }
    }

    /// `x-ippan-<kind>-upstream`
    #[must_use]
    pub fn upstream_header(self) -> &'static str {
        match self {
            Self::Status => "x-ippan-status-upstream",
            Self::Finality => "x-ippan-finality-upstream",
            Self::Nodes => "x-ippan-nodes-upstream",
        }
    }

    /// `x-ippan-<kind>-age-ms`
    #[must_use]
    pub fn age_header(self) -> &'static str {
        match self {
            Self::Status => "x-ippan-status-age-ms",
            Self::Finality => "x-ippan-finality-age-ms",
            Self::Nodes => "x-ippan-nodes-age-ms",
        }
    }
}

/// Last-known-good upstream payload for one endpoint.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub fetched_at: Instant,
    pub upstream: String,
    pub body: Bytes,
}

impl Snapshot {
    #[must_use]
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    #[must_use]
    pub fn age_ms(&self) -> u64 {
        self.age().as_millis().try_into().unwrap_or(u64::MAX)
    }

    /// Parses the body as JSON; `None` when it is not JSON.
    #[must_use]
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Where an endpoint sits in its freshness lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    /// Nothing captured yet.
    Empty,
    /// Captured, older than the TTL.
    Stale,
    /// Captured, younger than the TTL.
    Fresh,
}

impl SnapshotState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Stale => "stale",
            Self::Fresh => "fresh",
        }
    }
}

/// Result of a snapshot read. Never an error.
#[derive(Debug, Clone)]
pub enum SnapshotRead {
    Fresh(Arc<Snapshot>),
    /// Served immediately while a background refresh runs.
    Stale(Arc<Snapshot>),
    /// No data could be obtained; the caller renders a warming-up marker.
    Warming,
}

impl SnapshotRead {
    #[must_use]
    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match self {
            Self::Fresh(snapshot) | Self::Stale(snapshot) => Some(snapshot),
            Self::Warming => None,
        }
    }

    #[must_use]
    pub fn is_warming(&self) -> bool {
        matches!(self, Self::Warming)
    }

    /// Value of the `x-ippan-<kind>-source` header.
    #[must_use]
    pub fn source_label(&self) -> &'static str {
        match self {
            Self::Fresh(_) | Self::Stale(_) => "snapshot",
            Self::Warming => "warming",
        }
    }

    /// `x-ippan-<kind>-source`, plus `-upstream` and `-age-ms` when a
    /// snapshot exists.
    #[must_use]
    pub fn diagnostic_headers(&self, kind: SnapshotKind) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(kind.source_header()),
            HeaderValue::from_static(self.source_label()),
        );
        if let Some(snapshot) = self.snapshot() {
            if let Ok(value) = HeaderValue::from_str(&snapshot.upstream) {
                headers.insert(HeaderName::from_static(kind.upstream_header()), value);
            }
            headers.insert(
                HeaderName::from_static(kind.age_header()),
                HeaderValue::from(snapshot.age_ms()),
            );
        }
        headers
    }

    fn metric_label(&self) -> &'static str {
        match self {
            Self::Fresh(_) => "fresh",
            Self::Stale(_) => "stale",
            Self::Warming => "warming",
        }
    }
}

struct SnapshotSlot {
    snapshot: Option<Arc<Snapshot>>,
    /// Completion signal of the running refresh, if any.
    inflight: Option<watch::Receiver<bool>>,
}

/// Serve-then-refresh cache for one slow upstream endpoint.
///
/// Reads never wait on the upstream while any snapshot exists. At most one
/// refresh runs at a time: the in-flight check and the registration of a new
/// refresh happen under one lock with no await in between. The refresh runs
/// as its own task, so it completes even if every reader has gone away.
///
/// Refreshes go to the primary mirror only, with the endpoint's own timeout.
/// A failed refresh leaves the previous snapshot untouched.
pub struct SnapshotRefresher {
    kind: SnapshotKind,
    settings: SnapshotConfig,
    config: Arc<AppConfig>,
    client: Arc<HttpClient>,
    metrics: Arc<MetricsCollector>,
    slot: Mutex<SnapshotSlot>,
}

impl SnapshotRefresher {
    #[must_use]
    pub fn new(
        kind: SnapshotKind,
        settings: SnapshotConfig,
        config: Arc<AppConfig>,
        client: Arc<HttpClient>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            kind,
            settings,
            config,
            client,
            metrics,
            slot: Mutex::new(SnapshotSlot { snapshot: None, inflight: None }),
        }
    }

    /// Reads the endpoint, refreshing from `path` on the primary mirror if needed.
    ///
    /// - Fresh: returned as-is.
    /// - Stale: returned immediately; a refresh is started unless one is running.
    /// - Empty: waits for the running refresh (starting one if needed), then
    ///   returns its result or [`SnapshotRead::Warming`].
    pub async fn read(self: &Arc<Self>, path: &str) -> SnapshotRead {
        let ttl = self.settings.ttl();

        let (current, fresh, inflight) = {
            let mut slot = self.slot.lock();
            let fresh = slot.snapshot.as_ref().is_some_and(|s| s.age() < ttl);
            if !fresh && slot.inflight.is_none() {
                slot.inflight = Some(self.spawn_refresh(path.to_string()));
            }
            (slot.snapshot.clone(), fresh, slot.inflight.clone())
        };

        let read = match current {
            Some(snapshot) if fresh => SnapshotRead::Fresh(snapshot),
            Some(snapshot) => SnapshotRead::Stale(snapshot),
            None => {
                if let Some(mut done) = inflight {
                    // Err means the refresh task went away without signalling.
                    let _ = done.wait_for(|finished| *finished).await;
                }
                let latest = self.slot.lock().snapshot.clone();
                latest.map_or(SnapshotRead::Warming, SnapshotRead::Fresh)
            }
        };

        self.metrics.record_snapshot_read(self.kind.as_str(), read.metric_label());
        read
    }

    /// Current state without triggering anything.
    #[must_use]
    pub fn state(&self) -> SnapshotState {
        let slot = self.slot.lock();
        match &slot.snapshot {
            None => SnapshotState::Empty,
            Some(s) if s.age() < self.settings.ttl() => SnapshotState::Fresh,
            Some(_) => SnapshotState::Stale,
        }
    }

    /// The stored snapshot without triggering a refresh.
    #[must_use]
    pub fn peek(&self) -> Option<Arc<Snapshot>> {
        self.slot.lock().snapshot.clone()
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.slot.lock().inflight.is_some()
    }

    /// Must be called with the slot lock held.
    fn spawn_refresh(self: &Arc<Self>, path: String) -> watch::Receiver<bool> {
        let (done_tx, done_rx) = watch::channel(false);
        let this = Arc::clone(self);

        debug!(snapshot = this.kind.as_str(), path = %path, "snapshot refresh started");

        tokio::spawn(async move {
            let fetched = this.fetch(&path).await;
            {
                let mut slot = this.slot.lock();
                if let Some(snapshot) = fetched {
                    let newer = slot
                        .snapshot
                        .as_ref()
                        .map_or(true, |current| current.fetched_at <= snapshot.fetched_at);
                    if newer {
                        slot.snapshot = Some(Arc::new(snapshot));
                    }
                }
                slot.inflight = None;
            }
            done_tx.send_replace(true);
        });

        done_rx
    }

    async fn fetch(&self, path: &str) -> Option<Snapshot> {
        let Some(upstream) = self.config.primary_upstream() else {
            debug!(snapshot = self.kind.as_str(), "no upstream configured, skipping refresh");
            return None;
        };

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = self.config.proxy_key() {
            if let Ok(value) = HeaderValue::from_str(key) {
                headers.insert(HEADER_EXPLORER_KEY, value);
            }
        }

        let url = format!("{upstream}{path}");
        let started = Instant::now();
        let result = self
            .client
            .timed_fetch(FetchRequest::get(url, headers, self.settings.timeout()))
            .await;
        let elapsed_ms: u64 = started.elapsed().as_millis().try_into().unwrap_or(u64::MAX);

        match result {
            Ok(response) if response.status.is_success() => {
                self.metrics.record_snapshot_refresh(self.kind.as_str(), true, elapsed_ms);
                debug!(
                    snapshot = self.kind.as_str(),
                    upstream = %upstream,
                    elapsed_ms = elapsed_ms,
                    "snapshot refreshed"
                );
                Some(Snapshot { fetched_at: Instant::now(), upstream, body: response.body })
            }
            Ok(response) => {
                self.metrics.record_snapshot_refresh(self.kind.as_str(), false, elapsed_ms);
                warn!(
                    snapshot = self.kind.as_str(),
                    upstream = %upstream,
                    status = response.status.as_u16(),
                    "snapshot refresh rejected, keeping previous snapshot"
                );
                None
            }
            Err(e) => {
                self.metrics.record_snapshot_refresh(self.kind.as_str(), false, elapsed_ms);
                warn!(
                    snapshot = self.kind.as_str(),
                    upstream = %upstream,
                    error = %e,
                    "snapshot refresh failed, keeping previous snapshot"
                );
                None
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn install(&self, snapshot: Snapshot) {
        self.slot.lock().snapshot = Some(Arc::new(snapshot));
    }
}
