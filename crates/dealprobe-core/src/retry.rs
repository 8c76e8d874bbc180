use crate::cancel::CancelToken;
use crate::classify::is_rate_limited;
use std::future::Future;
use tokio::time::Duration;

/// Bounded retry for transient rate-limit failures. Anything else propagates
/// on the first attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(1500),
        }
    }
}

/// Runs `op`, retrying only on rate-limit errors, up to the policy cap. The
/// backoff wait is abandoned early on cancellation; the last error is
/// propagated unchanged once retries are exhausted.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    mut op: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                let retryable = is_rate_limited(&e.to_string());
                if !retryable || attempt == attempts || cancel.is_cancelled() {
                    return Err(e);
                }
                tracing::warn!(attempt, error = %e, "rate limited, backing off");
                tokio::select! {
                    _ = tokio::time::sleep(policy.backoff) => {}
                    _ = cancel.cancelled() => return Err(e),
                }
            }
        }
    }

    // The final attempt always returns above; keep the compiler honest.
    Err(anyhow::anyhow!("retry attempts exhausted"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retries_rate_limit_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let out = with_retry(&fast_policy(), &CancelToken::new(), move || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    anyhow::bail!("HTTP 429 Too Many Requests")
                }
                Ok(7u32)
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_propagates_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let err = with_retry(&fast_policy(), &CancelToken::new(), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("permission denied");
                #[allow(unreachable_code)]
                Ok(())
            }
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("permission denied"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_propagate_last_error_unchanged() {
        let err = with_retry(&fast_policy(), &CancelToken::new(), || async {
            anyhow::bail!("rate limit exceeded");
            #[allow(unreachable_code)]
            Ok(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "rate limit exceeded");
    }

    #[tokio::test]
    async fn test_cancellation_skips_backoff() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let err = with_retry(&fast_policy(), &cancel, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("429");
                #[allow(unreachable_code)]
                Ok(())
            }
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("429"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
