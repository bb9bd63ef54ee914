//! Background-refreshed snapshots for slow upstream endpoints.
//!
//! `/v1/status` can take up to a minute on a loaded node, and the finality
//! and node listings are not much better. Each of them gets a
//! [`SnapshotRefresher`] that serves the last good payload immediately and
//! refreshes it at most once at a time.
//!
//! # State Machine
//!
//! ```text
//!            read (waits)                 age >= ttl
//!   Empty ───────────────► Fresh ─────────────────────► Stale
//!     │  refresh failed      ▲                            │
//!     ▼                      │   refresh succeeded        │ read (returns at once,
//!  Warming marker            └────────────────────────────┘  starts one refresh)
//! ```

pub mod refresher;

use std::sync::Arc;

use crate::{
    config::AppConfig, metrics::MetricsCollector, types::encode_query_value, upstream::HttpClient,
};

pub use refresher::{Snapshot, SnapshotKind, SnapshotRead, SnapshotRefresher, SnapshotState};

/// Default row count for `/v1/finality/recent`.
pub const DEFAULT_FINALITY_LIMIT: &str = "25";

/// The three guarded endpoints of one process.
pub struct SnapshotSet {
    pub status: Arc<SnapshotRefresher>,
    pub finality: Arc<SnapshotRefresher>,
    pub nodes: Arc<SnapshotRefresher>,
}

impl SnapshotSet {
    #[must_use]
    pub fn new(
        config: &Arc<AppConfig>,
        client: &Arc<HttpClient>,
        metrics: &Arc<MetricsCollector>,
    ) -> Self {
        let build = |kind, settings| {
            Arc::new(SnapshotRefresher::new(
                kind,
                settings,
                Arc::clone(config),
                Arc::clone(client),
                Arc::clone(metrics),
            ))
        };

        Self {
            status: build(SnapshotKind::Status, config.snapshots.status),
            finality: build(SnapshotKind::Finality, config.snapshots.finality),
            nodes: build(SnapshotKind::Nodes, config.snapshots.nodes),
        }
    }

    pub async fn read_status(&self) -> SnapshotRead {
        self.status.read("/v1/status").await
    }

    /// The refresh uses the limit of the read that triggered it.
    pub async fn read_finality(&self, limit: Option<&str>) -> SnapshotRead {
        let limit = limit.unwrap_or(DEFAULT_FINALITY_LIMIT);
        let path = format!("/v1/finality/recent?limit={}", encode_query_value(limit));
        self.finality.read(&path).await
    }

    pub async fn read_nodes(&self) -> SnapshotRead {
        self.nodes.read("/v1/network/nodes").await
    }

    #[must_use]
    pub fn get(&self, kind: SnapshotKind) -> &Arc<SnapshotRefresher> {
        match kind {
            SnapshotKind::Status => &self.status,
            SnapshotKind::Finality => &self.finality,
            SnapshotKind::Nodes => &self.nodes,
        }
    }
}
