use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::StageError;

/// Retry policy for transient external failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

/// Run `op` up to `max_attempts` times, sleeping with exponential backoff
/// between attempts.
///
/// Only transient errors are retried; structural and fatal errors propagate
/// immediately so the caller can remediate (split) or abort. Exhaustion
/// promotes the last transient error to the caller unchanged.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, StageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StageError>>,
{
    let mut delay = policy.base_delay;
    let mut last_err = None;

    for attempt in 1..=policy.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                warn!(
                    "{} transient failure (attempt {}/{}), retrying in {:?}: {}",
                    what, attempt, policy.max_attempts, delay, e
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| StageError::Fatal(format!("{} failed without attempts", what))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&fast_policy(), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, StageError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_errors_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&fast_policy(), "op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(StageError::Transient("503".to_string()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&fast_policy(), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StageError::Fatal("bad request".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(StageError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_too_large_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&fast_policy(), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StageError::PayloadTooLarge("20MB".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(StageError::PayloadTooLarge(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_transient() {
        let result: Result<(), _> = retry_with_backoff(&fast_policy(), "op", || async {
            Err(StageError::Transient("still down".to_string()))
        })
        .await;
        assert!(matches!(result, Err(StageError::Transient(_))));
    }
}
