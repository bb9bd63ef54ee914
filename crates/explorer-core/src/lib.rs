//! # Explorer Core
//!
//! Upstream access layer for the IPPAN DevNet explorer.
//!
//! - **[`upstream`]**: Mirror list resolution and the timed HTTP fetch every
//!   outbound request goes through.
//!
//! - **[`proxy`]**: Byte-for-byte relay of the raw `/v1` API with bounded
//!   retries across mirrors and diagnostic headers.
//!
//! - **[`cache`]**: Short-lived in-memory cache of successful GET responses.
//!
//! - **[`snapshot`]**: Serve-then-refresh snapshots for slow endpoints
//!   (`/v1/status`, `/v1/finality/recent`, `/v1/network/nodes`).
//!
//! - **[`normalize`]**: Total mapping from whatever JSON the node returns to
//!   the canonical explorer schemas.
//!
//! - **[`explorer`]**: Canonical lookups with legacy-path fallback and
//!   degraded defaults.
//!
//! - **[`metrics`]**: Prometheus metrics collection.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       ExplorerService                        │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌──────────────┐  │
//! │  │   ProxyEngine   │  │   SnapshotSet   │  │  Normalizers │  │
//! │  └───┬─────────┬───┘  └────────┬────────┘  └──────────────┘  │
//! │      │         │               │                             │
//! │  ┌───▼───┐ ┌───▼───────────────▼──┐  ┌────────────────────┐  │
//! │  │ Cache │ │ HttpClient (timed)   │  │ MetricsCollector   │  │
//! │  └───────┘ └──────────────────────┘  └────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod explorer;
pub mod metrics;
pub mod normalize;
pub mod proxy;
pub mod snapshot;
pub mod types;
pub mod upstream;
