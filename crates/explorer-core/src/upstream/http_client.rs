use bytes::Bytes;
use reqwest::{header::HeaderMap, Client, ClientBuilder, Method, StatusCode};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Semaphore;
use url::Url;

use crate::upstream::UpstreamError;

/// Configuration for the shared outbound HTTP client.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum number of upstream requests in flight at once
    pub concurrent_limit: usize,
    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// How long idle pooled connections are kept, in seconds
    pub pool_idle_timeout_secs: u64,
    /// User agent sent to every upstream
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            concurrent_limit: 512,
            connect_timeout_ms: 3_000,
            pool_idle_timeout_secs: 30,
            user_agent: concat!("ippan-explorer-gateway/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// A single outbound request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Duration,
}

impl FetchRequest {
    /// Builds a body-less GET request.
    #[must_use]
    pub fn get(url: impl Into<String>, headers: HeaderMap, timeout: Duration) -> Self {
        Self { url: url.into(), method: Method::GET, headers, body: None, timeout }
    }
}

/// A fully buffered upstream response.
///
/// Any status code may appear here; interpreting it is the caller's job.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub elapsed_ms: u64,
}

/// HTTP client that enforces a hard wall-clock timeout per request.
///
/// The timeout covers permit acquisition, connection, headers and the full
/// body. When it fires the in-flight future is dropped, which aborts the
/// underlying connection on a best-effort basis.
pub struct HttpClient {
    client: Client,
    concurrent_limit: Arc<Semaphore>,
}

impl HttpClient {
    /// Creates a client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn new() -> Result<Self, UpstreamError> {
        Self::with_config(&HttpClientConfig::default())
    }

    /// Creates a client with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn with_config(config: &HttpClientConfig) -> Result<Self, UpstreamError> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(config.user_agent.as_str())
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                UpstreamError::ClientBuild(e.to_string())
            })?;

        Ok(Self { client, concurrent_limit: Arc::new(Semaphore::new(config.concurrent_limit)) })
    }

    /// Sanitizes network errors so diagnostics never echo internal addresses.
    fn sanitize_network_error(error: &reqwest::Error) -> String {
        if error.is_connect() {
            "connection refused or unreachable".to_string()
        } else if error.is_timeout() {
            "connection timed out".to_string()
        } else if error.is_body() || error.is_decode() {
            "response body error".to_string()
        } else if error.is_redirect() {
            "unexpected redirect".to_string()
        } else if error.is_request() {
            "request failed".to_string()
        } else {
            "network error".to_string()
        }
    }

    /// Performs one request with a hard timeout.
    ///
    /// Non-2xx responses are returned as `Ok`. Only transport failures are
    /// errors.
    ///
    /// # Errors
    ///
    /// - [`UpstreamError::Timeout`] when the budget expires
    /// - [`UpstreamError::Network`] for connection-level failures
    /// - [`UpstreamError::InvalidUrl`] when the URL cannot be parsed
    pub async fn timed_fetch(
        &self,
        request: FetchRequest,
    ) -> Result<FetchedResponse, UpstreamError> {
        let FetchRequest { url, method, headers, body, timeout } = request;
        let timeout_ms: u64 = timeout.as_millis().try_into().unwrap_or(u64::MAX);

        let parsed = Url::parse(&url).map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;
        let started = Instant::now();

        let work = async {
            let _permit = Arc::clone(&self.concurrent_limit)
                .acquire_owned()
                .await
                .map_err(|_| UpstreamError::Network("http client closed".to_string()))?;

            let mut builder = self.client.request(method.clone(), parsed).headers(headers);
            if let Some(body) = body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout { timeout_ms }
                } else {
                    UpstreamError::Network(Self::sanitize_network_error(&e))
                }
            })?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| UpstreamError::Network(Self::sanitize_network_error(&e)))?;

            Ok::<_, UpstreamError>((status, headers, body))
        };

        let outcome = tokio::time::timeout(timeout, work).await;
        let elapsed_ms: u64 = started.elapsed().as_millis().try_into().unwrap_or(u64::MAX);

        match outcome {
            Ok(Ok((status, headers, body))) => {
                tracing::trace!(
                    url = %url,
                    method = %method,
                    status = status.as_u16(),
                    elapsed_ms = elapsed_ms,
                    "upstream request completed"
                );
                Ok(FetchedResponse { status, headers, body, elapsed_ms })
            }
            Ok(Err(e)) => {
                tracing::trace!(
                    url = %url,
                    error = %e,
                    elapsed_ms = elapsed_ms,
                    "upstream request failed"
                );
                Err(e)
            }
            Err(_) => {
                tracing::trace!(url = %url, timeout_ms = timeout_ms, "upstream request timed out");
                Err(UpstreamError::Timeout { timeout_ms })
            }
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.concurrent_limit.available_permits()
    }
}
