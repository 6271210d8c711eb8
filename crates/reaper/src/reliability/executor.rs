//! Retry-protected execution of remote operations

use std::fmt::Display;
use std::future::Future;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::retry::RetryPolicy;

/// The caller's cancellation token fired
///
/// Never reported as an [`Outcome`]: cancellation bypasses retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Last error of an operation whose retry budget ran out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure<E> {
    /// Error returned by the final attempt
    pub cause: E,
    /// Number of attempts made
    pub attempts: u32,
}

/// Terminal result of a retried operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// An attempt succeeded; no further attempts were made
    Success { value: T, attempts: u32 },
    /// Every permitted attempt failed
    Failure(RetryFailure<E>),
}

impl<T, E> Outcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Attempts used to reach this outcome
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } => *attempts,
            Self::Failure(failure) => failure.attempts,
        }
    }
}

/// Runs an operation until it succeeds or the [`RetryPolicy`] is exhausted
///
/// Every error is treated as retryable. Between attempts the executor
/// sleeps for the policy's fixed backoff; before each retry it checks that
/// the time elapsed since the first attempt is still below the policy
/// timeout.
///
/// The cancellation token is raced against both the running operation and
/// the backoff sleep. When it fires, the executor returns [`Cancelled`]
/// without making another attempt.
///
/// # Example
///
/// ```ignore
/// let executor = RetryExecutor::new(RetryPolicy::deprovision());
///
/// match executor.execute(|| cloud.deprovision(&worker), &cancel).await? {
///     Outcome::Success { attempts, .. } => info!(attempts, "deprovisioned"),
///     Outcome::Failure(failure) => warn!(error = %failure.cause, "gave up"),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create an executor for the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The policy governing retries
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `operation` with retries
    pub async fn execute<F, Fut, T, E>(
        &self,
        mut operation: F,
        cancel: &CancellationToken,
    ) -> Result<Outcome<T, E>, Cancelled>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        let started = Instant::now();
        let budget = self.policy.attempt_budget();
        let mut attempts = 0;

        loop {
            attempts += 1;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Cancelled),
                result = operation() => result,
            };

            let cause = match result {
                Ok(value) => return Ok(Outcome::Success { value, attempts }),
                Err(cause) => cause,
            };

            let elapsed = started.elapsed();
            if attempts >= budget || elapsed >= self.policy.timeout {
                debug!(
                    attempts,
                    max_attempts = budget,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %cause,
                    "Retry budget exhausted"
                );
                return Ok(Outcome::Failure(RetryFailure { cause, attempts }));
            }

            let delay = self.policy.delay_for_attempt(attempts + 1);
            debug!(
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %cause,
                "Attempt failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let executor = RetryExecutor::new(RetryPolicy::deprovision());
        let calls = AtomicU32::new(0);

        let outcome = executor
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, String>("done") }
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Success {
                value: "done",
                attempts: 1
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_stops_further_attempts() {
        let executor = RetryExecutor::new(RetryPolicy::deprovision().with_max_attempts(5));
        let calls = AtomicU32::new(0);

        let outcome = executor
            .execute(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        if n < 2 {
                            Err(format!("attempt {n} failed"))
                        } else {
                            Ok(n)
                        }
                    }
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts_with_fixed_backoff() {
        let executor = RetryExecutor::new(RetryPolicy::deprovision());
        let starts = Mutex::new(Vec::new());

        let outcome = executor
            .execute(
                || {
                    starts.lock().unwrap().push(Instant::now());
                    let n = starts.lock().unwrap().len();
                    async move { Err::<(), _>(format!("failure {n}")) }
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Failure(RetryFailure {
                cause: "failure 3".to_string(),
                attempts: 3
            })
        );

        let starts = starts.into_inner().unwrap();
        assert_eq!(starts.len(), 3);
        for pair in starts.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= Duration::from_secs(10), "gap too short: {gap:?}");
            assert!(gap < Duration::from_secs(11), "gap too long: {gap:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_curtails_attempts() {
        // Each attempt takes 20s: the ceiling is passed after the second one
        let policy = RetryPolicy::deprovision()
            .with_max_attempts(5)
            .with_timeout(Duration::from_secs(25));
        let executor = RetryExecutor::new(policy);
        let calls = AtomicU32::new(0);

        let outcome = executor
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async {
                        tokio::time::sleep(Duration::from_secs(20)).await;
                        Err::<(), _>("slow failure")
                    }
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.attempts(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ceiling_allows_single_attempt() {
        let executor =
            RetryExecutor::new(RetryPolicy::deprovision().with_timeout(Duration::ZERO));
        let calls = AtomicU32::new(0);

        let outcome = executor
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>("down") }
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_attempts_runs_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            backoff: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
        };
        let executor = RetryExecutor::new(policy);
        let calls = AtomicU32::new(0);

        let outcome = executor
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>("down") }
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let executor = RetryExecutor::new(RetryPolicy::deprovision());
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let result = executor
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>("down") }
                },
                &cancel,
            )
            .await;

        assert_eq!(result, Err(Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_operation() {
        let executor = RetryExecutor::new(RetryPolicy::deprovision());
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let result = executor
            .execute(
                || async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok::<_, String>(())
                },
                &cancel,
            )
            .await;

        assert_eq!(result, Err(Cancelled));
    }

    #[tokio::test]
    async fn test_already_cancelled_makes_no_attempt() {
        let executor = RetryExecutor::new(RetryPolicy::deprovision());
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = executor
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, String>(()) }
                },
                &cancel,
            )
            .await;

        assert_eq!(result, Err(Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
