use crate::proxy::ProxyError;

/// Failure of a canonical detail lookup.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExplorerError {
    /// Upstream answered 404 on both the `/v1` and the legacy path.
    #[error("not found")]
    NotFound,

    /// Upstream answered with a non-success status other than 404.
    #[error("upstream returned HTTP {0}")]
    UpstreamStatus(u16),

    #[error(transparent)]
    Upstream(#[from] ProxyError),
}
