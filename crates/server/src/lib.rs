//! HTTP front end of the explorer gateway.
//!
//! Wires the core services into an axum [`Router`] and applies the shared
//! layer stack. The binary in `main.rs` only loads configuration, sets up
//! logging and serves the router returned by [`create_app`].

pub mod middleware;
pub mod router;

use anyhow::Result;
use axum::Router;
use explorer_core::{
    cache::ResponseCache, config::AppConfig, explorer::ExplorerService,
    metrics::MetricsCollector, proxy::ProxyEngine, snapshot::SnapshotSet,
    upstream::HttpClient,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};
use tracing::info;

/// Builds the explorer service and everything it depends on.
///
/// # Errors
///
/// Returns an error if the metrics recorder or the HTTP client cannot be created.
pub fn build_explorer(config: AppConfig) -> Result<Arc<ExplorerService>> {
    let config = Arc::new(config);

    let metrics = Arc::new(
        MetricsCollector::new()
            .map_err(|e| anyhow::anyhow!("Failed to initialize metrics: {e}"))?,
    );
    let client = Arc::new(
        HttpClient::new().map_err(|e| anyhow::anyhow!("HTTP client initialization failed: {e}"))?,
    );
    let cache = Arc::new(ResponseCache::new(config.cache_ttl()));

    let proxy = Arc::new(ProxyEngine::new(
        Arc::clone(&config),
        Arc::clone(&client),
        cache,
        Arc::clone(&metrics),
    ));
    let snapshots = Arc::new(SnapshotSet::new(&config, &client, &metrics));

    info!(
        upstreams_count = config.upstreams().len(),
        cache_ttl_ms = config.cache.ttl_ms,
        "Explorer services initialized"
    );

    Ok(Arc::new(ExplorerService::new(config, proxy, snapshots, metrics)))
}

/// Builds the complete application: every route plus the layer stack.
pub fn create_app(explorer: Arc<ExplorerService>, config: &AppConfig) -> Router {
    let (set_request_id, propagate_request_id) = middleware::create_request_id_layers();

    // Layers run bottom-up: the request id is set before tracing sees the request.
    router::create_router(explorer)
        .layer(ConcurrencyLimitLayer::new(config.server.max_concurrent_requests))
        .layer(RequestBodyLimitLayer::new(config.server.request_body_limit_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http().make_span_with(middleware::RequestSpan))
        .layer(propagate_request_id)
        .layer(set_request_id)
}
