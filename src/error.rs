use thiserror::Error;

/// Error taxonomy for external-call failures.
///
/// Transient failures are retried with backoff; oversized payloads trigger
/// structural remediation (splitting the audio) instead of a retry; the
/// rest is fatal to the stage that raised it.
#[derive(Debug, Error)]
pub enum StageError {
    /// Service unavailable or rate-limited; safe to retry after a delay
    #[error("service temporarily unavailable: {0}")]
    Transient(String),

    /// The service rejected the payload as too large; split and resubmit
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// An asynchronous job did not finish within the polling window
    #[error("external job timed out after {0}s")]
    JobTimeout(u64),

    /// Unrecoverable failure; ends the session
    #[error("{0}")]
    Fatal(String),
}

impl StageError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classify an HTTP error response the way the remediation logic needs:
    /// 503/429 retry, 400 mentioning size triggers a split, anything else
    /// is fatal.
    pub fn from_http(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            503 | 429 => Self::Transient(format!("{}: {}", status, truncate(body, 200))),
            400 if body.to_lowercase().contains("too large") => {
                Self::PayloadTooLarge(truncate(body, 200).to_string())
            }
            _ => Self::Fatal(format!("{}: {}", status, truncate(body, 200))),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_503_is_transient() {
        let err = StageError::from_http(StatusCode::SERVICE_UNAVAILABLE, "down");
        assert!(err.is_transient());
    }

    #[test]
    fn test_429_is_transient() {
        let err = StageError::from_http(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(err.is_transient());
    }

    #[test]
    fn test_400_too_large_is_structural() {
        let err = StageError::from_http(StatusCode::BAD_REQUEST, "file is too large for model");
        assert!(matches!(err, StageError::PayloadTooLarge(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_other_400_is_fatal() {
        let err = StageError::from_http(StatusCode::BAD_REQUEST, "invalid language");
        assert!(matches!(err, StageError::Fatal(_)));
    }

    #[test]
    fn test_500_is_fatal() {
        let err = StageError::from_http(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(matches!(err, StageError::Fatal(_)));
    }
}
