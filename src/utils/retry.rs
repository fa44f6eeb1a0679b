use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

// ============================================================================
// Exponential Backoff Retry Strategy
// ============================================================================
//
// Bounded retries with doubling delay and jitter for calls to the external
// providers. Only errors classified as transient are retried; anything the
// provider answered definitively (4xx, decode failures) surfaces at once.
//
// ============================================================================

/// Classifies whether an error is worth retrying.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt. Doubles each retry.
    pub base_delay: Duration,
    /// Cap on the computed delay, before jitter.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// No retries at all. Used where the caller has its own fallback.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or the attempt
/// budget runs out. The last error is returned as-is so callers keep the
/// full failure detail.
pub async fn retry_transient<F, Fut, T, E>(
    policy: &RetryPolicy,
    service: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Transient + std::fmt::Display,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(service = %service, attempt, "call succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if !error.is_transient() => {
                return Err(error);
            }
            Err(error) if attempt >= policy.max_attempts => {
                tracing::warn!(
                    service = %service,
                    attempt,
                    error = %error,
                    "call failed after exhausting retries"
                );
                return Err(error);
            }
            Err(error) => {
                let delay = backoff_delay(policy, attempt);
                tracing::warn!(
                    service = %service,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient failure, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}

/// Doubling delay capped at `max_delay`, plus up to 25% jitter so callers
/// retrying in lockstep spread out.
fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let shift = (attempt - 1).min(16);
    let exponential = policy.base_delay.saturating_mul(1u32 << shift);
    let capped = exponential.min(policy.max_delay);

    let jitter_cap = (capped.as_millis() / 4) as u64;
    let jitter = rand::thread_rng().gen_range(0..=jitter_cap);
    capped + Duration::from_millis(jitter)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    enum TestError {
        Flaky,
        Fatal,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                TestError::Flaky => write!(f, "flaky"),
                TestError::Fatal => write!(f, "fatal"),
            }
        }
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, TestError::Flaky)
        }
    }

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_eventually() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = retry_transient(&quick_policy(3), "test", || {
            let calls = calls_clone.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TestError::Flaky)
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert!(matches!(result, Ok("done")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<(), _> = retry_transient(&quick_policy(2), "test", || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Flaky)
            }
        })
        .await;

        assert!(matches!(result, Err(TestError::Flaky)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<(), _> = retry_transient(&quick_policy(5), "test", || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Fatal)
            }
        })
        .await;

        assert!(matches!(result, Err(TestError::Fatal)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
        };

        // Attempt 5 would be 1600ms uncapped; jitter adds at most 25%.
        let delay = backoff_delay(&policy, 5);
        assert!(delay >= Duration::from_millis(400));
        assert!(delay <= Duration::from_millis(500));
    }
}
