//! Test helpers for driving the full gateway in-process.

use axum::{
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use explorer_core::{config::AppConfig, explorer::ExplorerService};
use serde_json::Value;
use server::{build_explorer, create_app};
use std::sync::Arc;
use tower::ServiceExt;

/// Configuration with short timeouts for `bases`.
///
/// Two retries, a one second ephemeral cache and snapshot TTLs long enough
/// that nothing refreshes unless a test shortens them.
#[must_use]
pub fn test_config(bases: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.environment = "test".to_string();
    config.upstreams.bases = bases.to_string();
    config.upstreams.timeout_ms = 500;
    config.upstreams.retries = 2;
    config.cache.ttl_ms = 1_000;
    config.snapshots.status.timeout_ms = 2_000;
    config.snapshots.finality.timeout_ms = 2_000;
    config.snapshots.nodes.timeout_ms = 2_000;
    config
}

/// Address nothing listens on, so connecting fails immediately.
pub async fn unused_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("ephemeral address");
    drop(listener);
    format!("http://{addr}")
}

/// The gateway with its full layer stack, plus the service behind it.
pub struct TestApp {
    pub router: Router,
    pub explorer: Arc<ExplorerService>,
}

impl TestApp {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let explorer = build_explorer(config.clone()).expect("valid test config");
        let router = create_app(Arc::clone(&explorer), &config);
        Self { router, explorer }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, HeaderMap::new(), Body::empty()).await
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        headers: HeaderMap,
        body: Body,
    ) -> TestResponse {
        let mut request = Request::builder().method(method).uri(uri).body(body).expect("request");
        request.headers_mut().extend(headers);

        let response = self.router.clone().oneshot(request).await.expect("infallible router");
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        TestResponse { status, headers, body }
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    /// Body parsed as JSON, `Null` when it is not JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}
