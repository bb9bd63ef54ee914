use crate::types::ProxyAttempt;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProxyError {
    /// No mirror is configured. Fatal for the request and never retried.
    #[error("UPSTREAM_V1_BASES not set")]
    NoUpstreamsConfigured,

    /// Every attempt ended in a transport failure.
    ///
    /// Carries one [`ProxyAttempt`] per try so the caller can report them.
    #[error("Proxy upstream failed: {detail}")]
    AllAttemptsFailed { attempts: Vec<ProxyAttempt>, upstreams: Vec<String>, detail: String },
}

impl ProxyError {
    /// HTTP status the error is surfaced with.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NoUpstreamsConfigured => 500,
            Self::AllAttemptsFailed { .. } => 502,
        }
    }

    /// Operator hint included in the error body.
    #[must_use]
    pub fn hint(&self) -> &'static str {
        match self {
            Self::NoUpstreamsConfigured => "Set UPSTREAM_V1_BASES to your HTTPS gateway base",
            Self::AllAttemptsFailed { .. } => {
                "Check gateway health, timeouts, and UPSTREAM_V1_BASES"
            }
        }
    }
}
