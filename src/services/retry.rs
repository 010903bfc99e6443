//! Exponential backoff for calls to external analysis services.
//!
//! Only failures an adapter classifies as rate-limited or transient are
//! retried. Rate-limit responses back off on a steeper curve, and a
//! server-provided retry hint always overrides the computed delay.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Backoff multiplier for ordinary transient failures.
const TRANSIENT_MULTIPLIER: u32 = 2;

/// Backoff multiplier for rate-limit responses.
const RATE_LIMIT_MULTIPLIER: u32 = 3;

/// How a failed call should be treated by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited { retry_after: Option<Duration> },
    Transient,
    Permanent,
}

/// Implemented by adapter errors so the executor can tell retryable failures apart.
pub trait Retryable {
    fn failure_kind(&self) -> FailureKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(2000),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Delay before the next attempt after `attempt` (1-based) failed with `kind`.
    ///
    /// `min(max_delay, base * multiplier^(attempt - 1))`, unless the service
    /// supplied an explicit retry-after, which is still capped at `max_delay`.
    /// Permanent failures never wait.
    pub fn backoff_delay(&self, attempt: u32, kind: FailureKind) -> Duration {
        let multiplier = match kind {
            FailureKind::RateLimited {
                retry_after: Some(hint),
            } => return hint.min(self.max_delay),
            FailureKind::RateLimited { retry_after: None } => RATE_LIMIT_MULTIPLIER,
            FailureKind::Transient => TRANSIENT_MULTIPLIER,
            FailureKind::Permanent => return Duration::ZERO,
        };

        let exponent = attempt.saturating_sub(1);
        let factor = multiplier.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("{0}")]
    Permanent(E),

    #[error("{operation} failed after {attempts} attempts: {last}")]
    Exhausted {
        operation: String,
        attempts: u32,
        last: E,
    },
}

impl<E> RetryError<E> {
    pub fn inner(&self) -> &E {
        match self {
            RetryError::Permanent(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or `max_attempts` is reached.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(operation = operation_name, attempt, "Call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        let kind = err.failure_kind();
        if kind == FailureKind::Permanent {
            tracing::debug!(operation = operation_name, attempt, error = %err, "Permanent failure, not retrying");
            return Err(RetryError::Permanent(err));
        }

        if attempt >= max_attempts {
            tracing::warn!(
                operation = operation_name,
                attempts = attempt,
                error = %err,
                "Retry attempts exhausted"
            );
            return Err(RetryError::Exhausted {
                operation: operation_name.to_string(),
                attempts: attempt,
                last: err,
            });
        }

        let delay = policy.backoff_delay(attempt, kind);
        let kind_label = match kind {
            FailureKind::RateLimited { .. } => "rate_limited",
            _ => "transient",
        };
        metrics::counter!("adapter_retries_total", "operation" => operation_name.to_string(), "kind" => kind_label)
            .increment(1);
        tracing::warn!(
            operation = operation_name,
            attempt,
            kind = kind_label,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retryable failure, backing off"
        );

        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError(FailureKind);

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error ({:?})", self.0)
        }
    }

    impl Retryable for TestError {
        fn failure_kind(&self) -> FailureKind {
            self.0
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(5))
    }

    #[test]
    fn test_rate_limit_backoff_grows_by_three() {
        let policy = RetryPolicy::new(5, Duration::from_millis(2000), Duration::from_secs(60));
        let kind = FailureKind::RateLimited { retry_after: None };
        let delays: Vec<u64> = (1..=3)
            .map(|attempt| policy.backoff_delay(attempt, kind).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![2000, 6000, 18000]);
    }

    #[test]
    fn test_transient_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_millis(2000), Duration::from_millis(10_000));
        let delays: Vec<u64> = (1..=5)
            .map(|attempt| policy.backoff_delay(attempt, FailureKind::Transient).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![2000, 4000, 8000, 10_000, 10_000]);
    }

    #[test]
    fn test_rate_limit_cap_applies() {
        let policy = RetryPolicy::new(5, Duration::from_millis(2000), Duration::from_millis(15_000));
        let kind = FailureKind::RateLimited { retry_after: None };
        assert_eq!(policy.backoff_delay(3, kind), Duration::from_millis(15_000));
        assert_eq!(policy.backoff_delay(40, kind), Duration::from_millis(15_000));
    }

    #[test]
    fn test_retry_after_overrides_backoff() {
        let policy = RetryPolicy::default();
        let kind = FailureKind::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(policy.backoff_delay(3, kind), Duration::from_secs(7));
    }

    #[test]
    fn test_retry_after_hint_is_capped() {
        let policy = RetryPolicy::default();
        let kind = FailureKind::RateLimited {
            retry_after: Some(Duration::from_secs(86_400)),
        };
        assert_eq!(policy.backoff_delay(1, kind), policy.max_delay);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(4), "flaky", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(TestError(FailureKind::Transient))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(4), "bad request", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError(FailureKind::Permanent))
        })
        .await;

        assert!(matches!(result, Err(RetryError::Permanent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempt_count() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(3), "vision analysis", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError(FailureKind::RateLimited { retry_after: None }))
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(err.to_string().starts_with("vision analysis failed after 3 attempts"));
    }
}
