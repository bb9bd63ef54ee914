use bytes::Bytes;
use dashmap::DashMap;
use reqwest::{header::HeaderMap, StatusCode};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};
use tracing::trace;

/// Cache key: the primary upstream plus the raw path and query.
///
/// The mirror that actually answered is not part of the key, so hits stay
/// stable while the proxy rotates across mirrors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub upstream: String,
    pub path_and_query: String,
}

impl CacheKey {
    #[must_use]
    pub fn new(upstream: impl Into<String>, path_and_query: impl Into<String>) -> Self {
        Self { upstream: upstream.into(), path_and_query: path_and_query.into() }
    }
}

/// A stored 2xx response with its filtered headers.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    expires_at: Instant,
}

impl CachedResponse {
    #[must_use]
    pub fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Hit/miss counters since process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Process-local GET response cache with a fixed TTL.
///
/// Entries are never evicted. An expired entry is ignored on read and
/// overwritten by the next successful fetch for the same key, so the map
/// grows with the number of distinct paths requested.
pub struct ResponseCache {
    entries: DashMap<CacheKey, CachedResponse>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { entries: DashMap::new(), ttl, hits: AtomicU64::new(0), misses: AtomicU64::new(0) }
    }

    /// Caching is off when the TTL is zero.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the entry for `key` if it has not expired.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        if !self.is_enabled() {
            return None;
        }

        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(path = %key.path_and_query, "response cache hit");
                Some(entry.value().clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Stores a response for the configured TTL, replacing any previous entry.
    ///
    /// Only 2xx responses are stored; anything else is ignored.
    pub fn put(&self, key: CacheKey, status: StatusCode, headers: HeaderMap, body: Bytes) {
        if !self.is_enabled() || !status.is_success() {
            return;
        }

        let expires_at = Instant::now() + self.ttl;
        trace!(path = %key.path_and_query, ttl_ms = self.ttl.as_millis(), "response cached");
        self.entries.insert(key, CachedResponse { status, headers, body, expires_at });
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> ResponseCacheStats {
        ResponseCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}
