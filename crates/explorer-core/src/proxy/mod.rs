//! Multi-upstream proxy for the raw `/v1` surface.
//!
//! # Request Processing Flow
//!
//! ```text
//! ProxyRequest
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ Resolve mirrors │ ─── none ──► ProxyError::NoUpstreamsConfigured (500)
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │  Cache check    │ ─── fresh hit ──► cached response (HIT, 0ms)
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ attempt i       │ ─── any HTTP status ──► relayed response (MISS)
//! │ mirror[i % n]   │
//! └────────┬────────┘
//!          │ transport failure
//!          ▼
//!   next attempt, up to retries + 1
//!          │
//!          ▼
//!  ProxyError::AllAttemptsFailed (502, with every attempt)
//! ```
//!
//! Non-2xx answers are never retried: a 404 from a healthy mirror must not be
//! masked by asking another, possibly stale, mirror.

pub mod engine;
pub mod errors;

pub use engine::{ProxyEngine, ProxyRequest, ProxyResponse};
pub use errors::ProxyError;
