//! Upstream doubles.

use axum::{http::StatusCode, Json, Router};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::Value;
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{net::TcpListener, task::JoinHandle};

/// mockito server serving canned JSON per path.
///
/// Paths are matched without their query string; every mock accepts any query.
pub struct MockUpstream {
    server: ServerGuard,
    mocks: Vec<Mock>,
}

impl MockUpstream {
    pub async fn new() -> Self {
        Self { server: Server::new_async().await, mocks: Vec::new() }
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.server.url()
    }

    /// Direct access for mocks that need custom matchers.
    pub fn server(&mut self) -> &mut ServerGuard {
        &mut self.server
    }

    /// Serves `body` with `status` for `method path`, any number of times.
    pub fn mock_json(
        &mut self,
        method: &str,
        path: &str,
        status: usize,
        body: &Value,
    ) -> &mut Self {
        let mock = self
            .server
            .mock(method, path)
            .match_query(Matcher::Any)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create();

        self.mocks.push(mock);
        self
    }

    /// Like [`Self::mock_json`] but returns the mock so the caller can assert
    /// the exact number of hits.
    pub fn expect_json(
        &mut self,
        method: &str,
        path: &str,
        status: usize,
        body: &Value,
        hits: usize,
    ) -> Mock {
        self.server
            .mock(method, path)
            .match_query(Matcher::Any)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .expect(hits)
            .create()
    }

    /// Answers 404 for `path`.
    pub fn mock_not_found(&mut self, path: &str) -> &mut Self {
        let mock = self
            .server
            .mock("GET", path)
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":"not found"}"#)
            .create();

        self.mocks.push(mock);
        self
    }
}

type Responder = dyn Fn(usize) -> (StatusCode, Value) + Send + Sync;

/// Real HTTP upstream answering every path after `delay`.
///
/// The responder gets the zero-based hit number, so successive calls can
/// return different payloads.
pub struct StubUpstream {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl StubUpstream {
    pub async fn start<F>(delay: Duration, respond: F) -> Self
    where
        F: Fn(usize) -> (StatusCode, Value) + Send + Sync + 'static,
    {
        let hits = Arc::new(AtomicUsize::new(0));
        let respond: Arc<Responder> = Arc::new(respond);

        let counter = Arc::clone(&hits);
        let app = Router::new().fallback(move || {
            let counter = Arc::clone(&counter);
            let respond = Arc::clone(&respond);
            async move {
                let hit = counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                let (status, body) = respond(hit);
                (status, Json(body))
            }
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub upstream");
        let addr = listener.local_addr().expect("stub upstream address");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, hits, handle }
    }

    /// Always answers 200 with `body`.
    pub async fn fixed(delay: Duration, body: Value) -> Self {
        Self::start(delay, move |_| (StatusCode::OK, body.clone())).await
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for StubUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Accepts TCP connections and holds them open without ever responding.
pub struct BlackHole {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl BlackHole {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind black hole");
        let addr = listener.local_addr().expect("black hole address");
        let handle = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        Self { addr, handle }
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for BlackHole {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
