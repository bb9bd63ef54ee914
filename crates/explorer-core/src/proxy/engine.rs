use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL, CONTENT_TYPE},
    Method, StatusCode,
};
use std::{sync::Arc, time::Instant};
use tracing::{debug, error, warn};

use crate::{
    cache::{CacheKey, ResponseCache},
    config::AppConfig,
    metrics::{AttemptOutcome, MetricsCollector},
    types::{
        proxy_cache_control, CacheStatus, ProxyAttempt, FORWARDED_RESPONSE_HEADERS,
        HEADER_EXPLORER_KEY, HEADER_PROXY, HEADER_PROXY_ATTEMPTS, HEADER_PROXY_CACHE,
        HEADER_PROXY_MS, HEADER_PROXY_UPSTREAM, PRIVATE_REQUEST_HEADERS, PROXY_VERSION,
    },
    upstream::{pick_upstream, FetchRequest, HttpClient},
};

use super::errors::ProxyError;

/// An inbound request as seen by the proxy.
///
/// `path_and_query` is appended verbatim to the chosen mirror's base URL.
/// Compatibility routes pass a rewritten path here instead of the inbound one.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ProxyRequest {
    /// Builds a header-less GET for internal callers.
    #[must_use]
    pub fn get(path_and_query: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path_and_query: path_and_query.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// GET without `Authorization`/`Cookie` and without `nocache=1`.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        if self.method != Method::GET {
            return false;
        }
        if PRIVATE_REQUEST_HEADERS.iter().any(|name| self.headers.contains_key(*name)) {
            return false;
        }
        let query = self.path_and_query.split_once('?').map_or("", |(_, query)| query);
        let nocache = url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "nocache")
            .map(|(_, value)| value == "1");
        nocache != Some(true)
    }

    fn has_body(&self) -> bool {
        !(self.method == Method::GET || self.method == Method::HEAD)
    }
}

/// A relayed upstream response with filtered and diagnostic headers applied.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Mirror that answered; the primary on a cache hit.
    pub upstream: String,
    pub elapsed_ms: u64,
    pub cache_status: CacheStatus,
    /// Transport failures on earlier mirrors before this one answered.
    /// Always empty on a cache hit.
    pub failed_attempts: Vec<ProxyAttempt>,
}

impl ProxyResponse {
    /// The `x-ippan-proxy*` headers only, for callers that build their own body.
    #[must_use]
    pub fn diagnostic_headers(&self) -> HeaderMap {
        let mut out = HeaderMap::new();
        for name in [
            HEADER_PROXY_UPSTREAM,
            HEADER_PROXY_MS,
            HEADER_PROXY,
            HEADER_PROXY_CACHE,
            HEADER_PROXY_ATTEMPTS,
        ] {
            if let Some(value) = self.headers.get(name) {
                out.insert(HeaderName::from_static(name), value.clone());
            }
        }
        out
    }

    /// Tries it took to get this response, counting the one that answered.
    #[must_use]
    pub fn attempt_count(&self) -> usize {
        match self.cache_status {
            CacheStatus::Hit => 0,
            CacheStatus::Miss => self.failed_attempts.len() + 1,
        }
    }

    /// Parses the body as JSON; `None` when it is not JSON.
    #[must_use]
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

/// Copies the allow-listed headers. Hop-by-hop headers never pass.
fn forwardable_headers(upstream_headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for &name in FORWARDED_RESPONSE_HEADERS {
        if let Some(value) = upstream_headers.get(name) {
            out.insert(HeaderName::from_static(name), value.clone());
        }
    }
    out
}

/// Multi-upstream proxy with bounded retries and a short-lived GET cache.
///
/// Mirrors are tried by plain rotation over the configured list, indexed by
/// attempt number. Only transport failures move on to the next mirror: a
/// reachable upstream answering 404 or 500 is relayed as-is.
pub struct ProxyEngine {
    config: Arc<AppConfig>,
    client: Arc<HttpClient>,
    cache: Arc<ResponseCache>,
    metrics: Arc<MetricsCollector>,
}

impl ProxyEngine {
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        client: Arc<HttpClient>,
        cache: Arc<ResponseCache>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self { config, client, cache, metrics }
    }

    /// Forwards `request` to the first mirror that produces a response.
    ///
    /// # Errors
    ///
    /// - [`ProxyError::NoUpstreamsConfigured`] if the mirror list is empty
    /// - [`ProxyError::AllAttemptsFailed`] if every attempt hit a transport failure
    pub async fn forward(&self, request: ProxyRequest) -> Result<ProxyResponse, ProxyError> {
        let upstreams = self.config.upstreams();
        let Some(primary) = upstreams.first().cloned() else {
            error!(path = %request.path_and_query, "no upstreams configured");
            return Err(ProxyError::NoUpstreamsConfigured);
        };

        let cacheable = request.is_cacheable() && self.cache.is_enabled();
        let cache_key = CacheKey::new(primary.as_str(), request.path_and_query.as_str());

        if cacheable {
            if let Some(hit) = self.cache.get(&cache_key) {
                debug!(path = %request.path_and_query, "proxy cache hit");
                self.metrics.record_cache_hit();
                let headers = self.decorate(hit.headers, &primary, 0, CacheStatus::Hit);
                return Ok(ProxyResponse {
                    status: hit.status,
                    headers,
                    body: hit.body,
                    upstream: primary,
                    elapsed_ms: 0,
                    cache_status: CacheStatus::Hit,
                    failed_attempts: Vec::new(),
                });
            }
            self.metrics.record_cache_miss();
        }

        let outbound_headers = self.outbound_headers(&request);
        let body = if request.has_body() { request.body.clone() } else { None };
        let attempts = self.config.proxy_attempts();
        let timeout = self.config.proxy_timeout();

        let mut attempted: Vec<ProxyAttempt> = Vec::new();
        let mut last_error = None;

        for attempt in 0..attempts {
            let Some(upstream) = pick_upstream(&upstreams, attempt) else {
                break;
            };
            let url = format!("{upstream}{}", request.path_and_query);

            let fetch = FetchRequest {
                url: url.clone(),
                method: request.method.clone(),
                headers: outbound_headers.clone(),
                body: body.clone(),
                timeout,
            };

            let started = Instant::now();
            match self.client.timed_fetch(fetch).await {
                Ok(response) => {
                    let outcome = if response.status.is_success() {
                        AttemptOutcome::Success
                    } else {
                        AttemptOutcome::Passthrough
                    };
                    self.metrics.record_attempt(upstream, outcome, response.elapsed_ms);

                    let safe_headers = forwardable_headers(&response.headers);
                    if cacheable && response.status.is_success() {
                        self.cache.put(
                            cache_key.clone(),
                            response.status,
                            safe_headers.clone(),
                            response.body.clone(),
                        );
                        self.metrics.record_cache_entries(self.cache.len());
                    }

                    let mut headers = self.decorate(
                        safe_headers,
                        upstream,
                        response.elapsed_ms,
                        CacheStatus::Miss,
                    );
                    headers.insert(
                        HeaderName::from_static(HEADER_PROXY_ATTEMPTS),
                        HeaderValue::from(attempted.len() + 1),
                    );
                    return Ok(ProxyResponse {
                        status: response.status,
                        headers,
                        body: response.body,
                        upstream: upstream.to_string(),
                        elapsed_ms: response.elapsed_ms,
                        cache_status: CacheStatus::Miss,
                        failed_attempts: attempted,
                    });
                }
                Err(e) => {
                    warn!(
                        upstream = %upstream,
                        attempt = attempt,
                        error = %e,
                        "proxy attempt failed"
                    );
                    self.metrics.record_upstream_error(upstream, &e);

                    let ms: u64 = started.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
                    self.metrics.record_attempt(upstream, AttemptOutcome::Failed, ms);
                    attempted.push(ProxyAttempt {
                        upstream: upstream.to_string(),
                        url,
                        method: request.method.to_string(),
                        err: format!("{}: {e}", e.code()),
                        ms,
                    });
                    let transient = e.is_transient();
                    last_error = Some(e);
                    if !transient {
                        break;
                    }
                }
            }
        }

        self.metrics.record_proxy_exhausted();
        let detail = last_error
            .map_or_else(|| "unknown error".to_string(), |e| format!("{}: {e}", e.code()));
        error!(
            path = %request.path_and_query,
            attempts = attempted.len(),
            detail = %detail,
            "all proxy attempts failed"
        );

        Err(ProxyError::AllAttemptsFailed { attempts: attempted, upstreams, detail })
    }

    fn outbound_headers(&self, request: &ProxyRequest) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let accept = request
            .headers
            .get(ACCEPT)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, accept);

        if let Some(key) = self.config.proxy_key() {
            set_header(&mut headers, HEADER_EXPLORER_KEY, key);
        }

        if request.has_body() {
            if let Some(content_type) = request.headers.get(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, content_type.clone());
            }
        }

        headers
    }

    fn decorate(
        &self,
        mut headers: HeaderMap,
        upstream: &str,
        elapsed_ms: u64,
        cache_status: CacheStatus,
    ) -> HeaderMap {
        set_header(&mut headers, HEADER_PROXY_UPSTREAM, upstream);
        set_header(&mut headers, HEADER_PROXY_MS, &elapsed_ms.to_string());
        set_header(&mut headers, HEADER_PROXY, PROXY_VERSION);
        set_header(&mut headers, HEADER_PROXY_CACHE, &cache_status.to_string());
        if let Ok(value) = HeaderValue::from_str(&proxy_cache_control(self.config.cache.ttl_ms)) {
            headers.insert(CACHE_CONTROL, value);
        }
        headers
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    #[must_use]
    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }
}
