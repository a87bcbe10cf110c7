//! A single retry helper wrapping I/O calls, replacing the decorator-based
//! retry pattern the source used (§9 re-architecture guidance).

use std::time::Duration;

use crate::error::IngestError;

/// Exponential-backoff retry policy (design §4.1 defaults).
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Wait before the first retry.
    pub initial_wait: Duration,
    /// Multiplier applied to the wait after each failed attempt.
    pub multiplier: f64,
    /// Upper bound on any single wait, regardless of the multiplier.
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_wait: Duration::from_secs(4),
            multiplier: 2.0,
            max_wait: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// The wait before attempt number `attempt` (1-indexed: the wait before
    /// the *second* attempt is `attempt = 1`), capped at `max_wait`.
    #[must_use]
    pub fn wait_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.initial_wait.as_secs_f64() * self.multiplier.powi(attempt as i32 - 1);
        Duration::from_secs_f64(scaled).min(self.max_wait)
    }
}

/// Runs `op`, retrying on failures the caller's `retryable` predicate
/// accepts, up to `policy.max_attempts` attempts total.
///
/// If the error carries a `Retry-After` hint larger than the computed
/// backoff wait (e.g. `IngestError::RateLimited`), that hint is honored
/// instead, per design §4.1.
///
/// # Errors
///
/// Returns the last error encountered once attempts are exhausted, or
/// immediately if `retryable` rejects an error.
pub async fn retry_with<F, Fut, T>(
    policy: &RetryPolicy,
    mut op: F,
    retryable: impl Fn(&IngestError) -> bool,
) -> Result<T, IngestError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, IngestError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && retryable(&err) => {
                let mut wait = policy.wait_for_attempt(attempt);
                if let IngestError::RateLimited {
                    retry_after: Some(hint),
                    ..
                } = &err
                {
                    wait = wait.max(*hint);
                }
                tracing::warn!(attempt, ?wait, error = %err, "retrying after transient failure");
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_wait: Duration::from_millis(1),
            multiplier: 1.0,
            max_wait: Duration::from_millis(5),
        };
        let calls = AtomicU32::new(0);
        let result = retry_with(
            &policy,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(IngestError::TransientNetwork("timeout".into()))
                    } else {
                        Ok(42)
                    }
                }
            },
            IngestError::is_retryable,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_short_circuits() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with(
            &policy,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(IngestError::Auth("bad credentials".into())) }
            },
            IngestError::is_retryable,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_budget_and_returns_last_error() {
        let policy = RetryPolicy {
            max_attempts: 2,
            initial_wait: Duration::from_millis(1),
            multiplier: 1.0,
            max_wait: Duration::from_millis(2),
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with(
            &policy,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(IngestError::TransientNetwork("timeout".into())) }
            },
            IngestError::is_retryable,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
