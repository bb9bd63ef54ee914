//! # Metrics Architecture
//!
//! Prometheus counters and histograms are recorded on every proxied request
//! and every snapshot refresh. Recording is lock-free; the `/metrics` endpoint
//! renders the exporter's text format.
//!
//! A small internal summary ([`ExplorerMetrics`]) is kept alongside for the
//! health endpoint and tests. It is updated opportunistically with
//! `try_write()` and may lag slightly behind Prometheus under contention.
//!
//! ## String Interning
//!
//! Upstream base URLs are interned to avoid per-request label allocations.
//! The set of configured mirrors is small, so the leak is bounded.

use crate::upstream::errors::UpstreamError;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::{
    borrow::Cow,
    collections::HashMap,
    sync::{Arc, OnceLock},
};
use tokio::sync::RwLock;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

// Upstream base URLs appear as metric labels. Keep /metrics on an internal
// network if mirror hostnames are sensitive.
static UPSTREAM_NAME_POOL: OnceLock<dashmap::DashMap<String, &'static str>> = OnceLock::new();

#[inline]
fn upstream_to_static(upstream: &str) -> Cow<'static, str> {
    let pool = UPSTREAM_NAME_POOL.get_or_init(dashmap::DashMap::new);

    if let Some(interned) = pool.get(upstream) {
        return Cow::Borrowed(*interned);
    }

    let owned = upstream.to_string();
    let leaked: &'static str = Box::leak(owned.clone().into_boxed_str());
    pool.insert(owned, leaked);
    Cow::Borrowed(leaked)
}

/// Outcome label for one proxy attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// 2xx from upstream.
    Success,
    /// Reachable upstream answered with a non-2xx status.
    Passthrough,
    /// Transport failure; the next mirror is tried.
    Failed,
}

impl AttemptOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Passthrough => "passthrough",
            Self::Failed => "failed",
        }
    }
}

/// Internal summary exposed for diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExplorerMetrics {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub exhausted: u64,
    pub upstream_errors: HashMap<String, u64>,
    pub snapshot_refreshes: HashMap<String, u64>,
    pub snapshot_refresh_failures: HashMap<String, u64>,
}

impl ExplorerMetrics {
    /// Ratio of cache hits among cacheable lookups, `0.0` when there were none.
    #[must_use]
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.cache_hits as f64 / lookups as f64;
        rate
    }
}

fn try_init_prometheus_recorder(
) -> Result<PrometheusHandle, metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().install_recorder()
}

fn init_prometheus_recorder() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| match try_init_prometheus_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "failed to install primary Prometheus recorder, attempting fallback"
                );

                let recorder = PrometheusBuilder::new().build_recorder();
                tracing::warn!(
                    error = %e,
                    "using fallback Prometheus recorder, metrics may not be globally visible"
                );
                recorder.handle()
            }
        })
        .clone()
}

pub struct MetricsCollector {
    metrics: Arc<RwLock<ExplorerMetrics>>,
    prometheus_handle: PrometheusHandle,
}

impl MetricsCollector {
    /// # Errors
    ///
    /// Returns an error if the Prometheus recorder cannot be initialized.
    pub fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let prometheus_handle = init_prometheus_recorder();

        Ok(Self { metrics: Arc::new(RwLock::new(ExplorerMetrics::default())), prometheus_handle })
    }

    /// Records one proxy attempt against `upstream`.
    pub fn record_attempt(&self, upstream: &str, outcome: AttemptOutcome, latency_ms: u64) {
        let upstream_cow = upstream_to_static(upstream);

        counter!(
            "explorer_proxy_requests_total",
            "upstream" => upstream_cow.clone(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
        #[allow(clippy::cast_precision_loss)]
        histogram!("explorer_proxy_request_duration_seconds", "upstream" => upstream_cow)
            .record(latency_ms as f64 / 1000.0);

        if let Ok(mut metrics) = self.metrics.try_write() {
            metrics.total_requests += 1;
        }
    }

    /// Records a transport failure with its classification.
    pub fn record_upstream_error(&self, upstream: &str, error: &UpstreamError) {
        let upstream_cow = upstream_to_static(upstream);
        counter!(
            "explorer_upstream_errors_total",
            "upstream" => upstream_cow,
            "error" => error.as_metric_str()
        )
        .increment(1);

        if let Ok(mut metrics) = self.metrics.try_write() {
            *metrics.upstream_errors.entry(upstream.to_string()).or_insert(0) += 1;
        }
    }

    /// Records a request that ran out of mirrors.
    pub fn record_proxy_exhausted(&self) {
        counter!("explorer_proxy_exhausted_total").increment(1);

        if let Ok(mut metrics) = self.metrics.try_write() {
            metrics.exhausted += 1;
        }
    }

    pub fn record_cache_hit(&self) {
        counter!("explorer_proxy_cache_hits_total").increment(1);

        if let Ok(mut metrics) = self.metrics.try_write() {
            metrics.cache_hits += 1;
        }
    }

    pub fn record_cache_miss(&self) {
        counter!("explorer_proxy_cache_misses_total").increment(1);

        if let Ok(mut metrics) = self.metrics.try_write() {
            metrics.cache_misses += 1;
        }
    }

    /// Record the number of live entries in the response cache.
    pub fn record_cache_entries(&self, entries: usize) {
        #[allow(clippy::cast_precision_loss)]
        gauge!("explorer_response_cache_entries").set(entries as f64);
    }

    /// Records the end of one snapshot refresh.
    pub fn record_snapshot_refresh(&self, snapshot: &'static str, success: bool, elapsed_ms: u64) {
        let outcome = if success { "success" } else { "failure" };
        counter!(
            "explorer_snapshot_refreshes_total",
            "snapshot" => snapshot,
            "outcome" => outcome
        )
        .increment(1);
        #[allow(clippy::cast_precision_loss)]
        histogram!("explorer_snapshot_refresh_duration_seconds", "snapshot" => snapshot)
            .record(elapsed_ms as f64 / 1000.0);

        if let Ok(mut metrics) = self.metrics.try_write() {
            *metrics.snapshot_refreshes.entry(snapshot.to_string()).or_insert(0) += 1;
            if !success {
                *metrics.snapshot_refresh_failures.entry(snapshot.to_string()).or_insert(0) += 1;
            }
        }
    }

    /// Records how a snapshot read was answered (`fresh`, `stale`, `warming`).
    pub fn record_snapshot_read(&self, snapshot: &'static str, source: &'static str) {
        counter!("explorer_snapshot_reads_total", "snapshot" => snapshot, "source" => source)
            .increment(1);
    }

    /// Get Prometheus metrics in text format
    #[must_use]
    pub fn get_prometheus_metrics(&self) -> String {
        self.prometheus_handle.render()
    }

    /// Get internal metrics
    pub async fn get_metrics_summary(&self) -> ExplorerMetrics {
        self.metrics.read().await.clone()
    }
}
