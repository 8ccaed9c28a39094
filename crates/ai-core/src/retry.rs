//! Bounded execution with backoff, per-attempt timeouts, and cancellation.
//!
//! The harness runs an operation until it succeeds, fails terminally, or the
//! attempt budget is exhausted. Between attempts it sleeps
//! `min(base * 2^(k-2), max)` with +/-20% jitter, unless the failure carried a
//! vendor `Retry-After`, which takes precedence.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::GatewayError;

/// Jitter applied to every backoff sleep, as a fraction of the delay.
const JITTER_FRACTION: f64 = 0.2;

/// Retry budget and timing for one provider in a router chain.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first. Must be >= 1.
    pub max_attempts: u32,
    /// Backoff before the second attempt.
    pub base_delay: Duration,
    /// Backoff cap.
    pub max_delay: Duration,
    /// Per-attempt timeout. A fired timeout classifies as retryable.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// Same policy with a different per-attempt timeout.
    ///
    /// Gateways carry their own timeouts (identification 10s, vision 15s,
    /// chat 15/30s, embedding 5s), so the router swaps this per route.
    pub fn with_timeout(&self, attempt_timeout: Duration) -> Self {
        Self {
            attempt_timeout,
            ..self.clone()
        }
    }

    /// Backoff before attempt `k` (1-indexed), without jitter.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        debug_assert!(attempt >= 2);
        let exp = attempt.saturating_sub(2).min(20);
        let scaled = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exp));
        scaled.min(self.max_delay)
    }
}

/// Apply +/-20% multiplicative jitter to a delay.
fn jittered(delay: Duration) -> Duration {
    let factor = 1.0 + rand::thread_rng().gen_range(-JITTER_FRACTION..=JITTER_FRACTION);
    delay.mul_f64(factor)
}

/// Run `op` under `policy` until success, a terminal failure, or the attempt
/// budget runs out. The final failure surfaces the last error.
///
/// `op` receives the 1-indexed attempt number. Cancellation is honored before
/// each attempt and during the backoff sleep; an in-flight attempt is not
/// forcibly killed, but its result is discarded once the per-attempt timeout
/// window closes.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, GatewayError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_err = GatewayError::service("no attempts were made");

    for attempt in 1..=max_attempts {
        if cancel.is_cancelled() {
            return Err(GatewayError::cancelled());
        }

        if attempt >= 2 {
            let delay = match last_err.retry_after {
                Some(hint) => hint.min(policy.max_delay),
                None => jittered(policy.delay_before(attempt)),
            };
            debug!(attempt, delay_ms = delay.as_millis() as u64, "backing off before retry");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(GatewayError::cancelled()),
            }
        }

        let outcome = tokio::select! {
            result = tokio::time::timeout(policy.attempt_timeout, op(attempt)) => result,
            _ = cancel.cancelled() => return Err(GatewayError::cancelled()),
        };

        match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) if !err.is_retryable() => return Err(err),
            Ok(Err(err)) => {
                warn!(attempt, error = %err, "attempt failed, will retry");
                last_err = err;
            }
            Err(_) => {
                warn!(
                    attempt,
                    timeout_ms = policy.attempt_timeout.as_millis() as u64,
                    "attempt timed out"
                );
                last_err = GatewayError::timeout(format!(
                    "attempt {} exceeded {}ms",
                    attempt,
                    policy.attempt_timeout.as_millis()
                ));
            }
        }
    }

    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use crate::error::ErrorKind;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            attempt_timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(1),
        };
        assert_eq!(policy.delay_before(2), Duration::from_millis(500));
        assert_eq!(policy.delay_before(3), Duration::from_secs(1));
        assert_eq!(policy.delay_before(4), Duration::from_secs(2));
        // 500ms * 2^9 = 256s, capped.
        let policy = RetryPolicy {
            max_attempts: 12,
            ..policy
        };
        assert_eq!(policy.delay_before(11), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_within_twenty_percent() {
        let base = Duration::from_millis(1000);
        for _ in 0..100 {
            let delay = jittered(base);
            assert!(delay >= Duration::from_millis(800), "too short: {:?}", delay);
            assert!(delay <= Duration::from_millis(1200), "too long: {:?}", delay);
        }
    }

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let cancel = CancellationToken::new();
        let result =
            run_with_retry(&quick_policy(), &cancel, |_| async { Ok::<_, GatewayError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_inner = calls.clone();

        let result = run_with_retry(&quick_policy(), &cancel, move |attempt| {
            let calls = calls_inner.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if attempt < 3 {
                    Err(GatewayError::service("flaky"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_terminal_error_stops_immediately() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_inner = calls.clone();

        let result: Result<(), _> = run_with_retry(&quick_policy(), &cancel, move |_| {
            let calls = calls_inner.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(GatewayError::auth("bad key"))
            }
        })
        .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::Auth);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_last_error() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_inner = calls.clone();

        let result: Result<(), _> = run_with_retry(&quick_policy(), &cancel, move |attempt| {
            let calls = calls_inner.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(GatewayError::service(format!("failure {}", attempt)))
            }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServiceError);
        assert!(err.message.contains("failure 3"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_attempt_timeout_classifies_as_timeout() {
        let cancel = CancellationToken::new();
        let policy = RetryPolicy {
            max_attempts: 1,
            attempt_timeout: Duration::from_millis(10),
            ..quick_policy()
        };

        let result: Result<(), _> = run_with_retry(&policy, &cancel, |_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_pre_cancelled_never_runs() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_inner = calls.clone();

        let result: Result<(), _> = run_with_retry(&quick_policy(), &cancel, move |_| {
            let calls = calls_inner.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff() {
        let cancel = CancellationToken::new();
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(30),
            attempt_timeout: Duration::from_millis(200),
        };

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel_clone.cancel();
        });

        let started = std::time::Instant::now();
        let result: Result<(), _> = run_with_retry(&policy, &cancel, |_| async {
            Err(GatewayError::service("first try fails"))
        })
        .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::Cancelled);
        // Must not have slept the full 30s backoff.
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_retry_after_overrides_backoff() {
        let cancel = CancellationToken::new();
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(10),
            attempt_timeout: Duration::from_millis(200),
        };

        let started = std::time::Instant::now();
        let result = run_with_retry(&policy, &cancel, |attempt| async move {
            if attempt == 1 {
                Err(GatewayError::rate_limit(
                    "throttled",
                    Some(Duration::from_millis(5)),
                ))
            } else {
                Ok("after hint")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "after hint");
        // The vendor hint (5ms) should win over the 10s backoff.
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
