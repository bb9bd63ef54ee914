//! Shared types for the proxy and snapshot layers.
//!
//! # Type Categories
//!
//! ## Diagnostic Header Names
//! Constants for the `x-ippan-*` headers attached to every relayed response.
//!
//! ## Proxy Types
//! - [`CacheStatus`]: Whether a proxied response came from the ephemeral cache
//! - [`ProxyAttempt`]: One failed try against a mirror, reported on total failure

use serde::{Deserialize, Serialize};

/// Shared secret forwarded to upstreams when configured.
pub const HEADER_EXPLORER_KEY: &str = "x-ippan-explorer-key";

/// Base URL of the mirror that produced the response.
pub const HEADER_PROXY_UPSTREAM: &str = "x-ippan-proxy-upstream";
/// Wall-clock milliseconds spent upstream; `0` on a cache hit.
pub const HEADER_PROXY_MS: &str = "x-ippan-proxy-ms";
/// Proxy generation marker, always `v1`.
pub const HEADER_PROXY: &str = "x-ippan-proxy";
/// `HIT` or `MISS`.
pub const HEADER_PROXY_CACHE: &str = "x-ippan-proxy-cache";
/// Number of attempts made before giving up.
pub const HEADER_PROXY_ATTEMPTS: &str = "x-ippan-proxy-attempts";
/// Comma-separated list of configured mirrors.
pub const HEADER_PROXY_UPSTREAMS: &str = "x-ippan-proxy-upstreams";

/// Value of [`HEADER_PROXY`].
pub const PROXY_VERSION: &str = "v1";

/// Response headers copied from upstream. Everything else, including
/// hop-by-hop headers, is dropped.
pub const FORWARDED_RESPONSE_HEADERS: &[&str] =
    &["content-type", "cache-control", "etag", "last-modified", "x-request-id", "x-ippan-node"];

/// Headers that make a request uncacheable.
pub const PRIVATE_REQUEST_HEADERS: &[&str] = &["authorization", "cookie"];

/// Cache behaviour of a proxied response.
///
/// # Examples
///
/// ```
/// use explorer_core::types::CacheStatus;
///
/// assert_eq!(CacheStatus::Hit.to_string(), "HIT");
/// assert_eq!(CacheStatus::Miss.to_string(), "MISS");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheStatus {
    /// Served from the ephemeral cache without touching an upstream.
    Hit,
    /// Fetched from an upstream.
    Miss,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStatus::Hit => write!(f, "HIT"),
            CacheStatus::Miss => write!(f, "MISS"),
        }
    }
}

/// One failed try against a mirror.
///
/// Serialized into the `attempted` array of the 502 body so that operators
/// can triage without server-side logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyAttempt {
    pub upstream: String,
    pub url: String,
    pub method: String,
    /// Transport error code and message, e.g. `TIMEOUT: request timed out`.
    pub err: String,
    pub ms: u64,
}

/// Builds the `cache-control` value for a relayed response.
///
/// Zero disables shared caching entirely. Otherwise CDNs may serve the
/// response for the TTL and revalidate in the background for four times as
/// long.
#[must_use]
pub fn proxy_cache_control(ttl_ms: u64) -> String {
    let seconds = ttl_ms / 1000;
    if seconds == 0 {
        return "no-store".to_string();
    }
    let swr = seconds.saturating_mul(4).max(1);
    format!("public, s-maxage={seconds}, stale-while-revalidate={swr}")
}

/// Percent-encodes a single query value.
#[must_use]
pub fn encode_query_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
