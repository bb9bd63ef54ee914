//! Ephemeral response cache for the multi-upstream proxy.
//!
//! The cache only exists to collapse bursts of identical polling requests
//! from many browser tabs into a single upstream call. Its TTL is on the
//! order of a second, it is never persisted, and every process instance has
//! its own copy.
//!
//! Keys are `(primary upstream, path + query)`. See [`CacheKey`].

pub mod response_cache;

pub use response_cache::{CacheKey, CachedResponse, ResponseCache, ResponseCacheStats};
