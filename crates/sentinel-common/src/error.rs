//! Error types for Ops Sentinel.

use thiserror::Error;

/// Failure from one of the remote capabilities (embedding, search,
/// inference). Only timeouts and busy signals are worth retrying.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("service busy (HTTP {0})")]
    Busy(u16),

    #[error("upstream call failed: {0}")]
    Failed(String),
}

impl UpstreamError {
    /// Whether another attempt has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(self, UpstreamError::Timeout(_) | UpstreamError::Busy(_))
    }
}

/// Top-level error taxonomy for the daemon.
#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("forensic chain is empty, nothing to resolve")]
    InvalidChain,

    #[error("resolution service unavailable after {attempts} attempts: {source}")]
    UpstreamUnavailable {
        attempts: u32,
        #[source]
        source: UpstreamError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(UpstreamError::Timeout(90).is_retryable());
        assert!(UpstreamError::Busy(503).is_retryable());
        assert!(!UpstreamError::Failed("bad request".to_string()).is_retryable());
    }

    #[test]
    fn test_unavailable_message_names_attempts() {
        let err = SentinelError::UpstreamUnavailable {
            attempts: 3,
            source: UpstreamError::Busy(503),
        };
        let msg = err.to_string();
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("unavailable"));
    }
}
