use thiserror::Error;

/// Errors produced by a single timed request against an upstream.
///
/// Only transport-level failures live here. A reachable upstream that answers
/// with a non-2xx status is not an error at this layer: the response is handed
/// back to the caller untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UpstreamError {
    /// The wall-clock budget for the request expired before a full response
    /// was read.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Connection-level failure (refused, reset, DNS, TLS, truncated body).
    #[error("network error: {0}")]
    Network(String),

    /// The upstream base and path did not form a valid URL.
    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),

    /// The shared HTTP client could not be constructed.
    #[error("http client build failed: {0}")]
    ClientBuild(String),
}

impl UpstreamError {
    /// Stable error code reported in diagnostic payloads.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "TIMEOUT",
            Self::Network(_) => "NETWORK_ERROR",
            Self::InvalidUrl(_) => "INVALID_URL",
            Self::ClientBuild(_) => "CLIENT_ERROR",
        }
    }

    /// Returns `true` if trying another mirror may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Network(_))
    }

    /// Short label used for metrics.
    #[must_use]
    pub fn as_metric_str(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Network(_) => "network",
            Self::InvalidUrl(_) => "invalid_url",
            Self::ClientBuild(_) => "client_build",
        }
    }
}
