//! Bounded retries with linear backoff
//!
//! [`RetryPolicy::execute`] calls an operation up to `max_attempts` times. The
//! caller's classifier decides after every failure whether to retry, retry
//! with a longer backoff, or abort. Attempt `n` that fails retryably is
//! followed by a sleep of `base_delay * n` (multiplied again for
//! [`RetryDecision::Backoff`]).

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::constants::limits;
use crate::errors::SourceError;

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the normal delay
    Retry,
    /// Try again after a longer delay
    Backoff,
    /// Give up and propagate the error
    Abort,
}

/// Outcome of a retry loop that did not succeed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed retryably
    #[error("retries exhausted after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: E },

    /// An attempt failed with an error classified as fatal
    #[error("{0}")]
    Fatal(E),

    /// The cancellation token fired at a decision point
    #[error("cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32, last: Option<E> },
}

impl<E> RetryError<E> {
    /// The most recent underlying error, if any attempt ran
    pub fn into_last(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last, .. } | RetryError::Fatal(last) => Some(last),
            RetryError::Cancelled { last, .. } => last,
        }
    }
}

/// Retry parameters for one call site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Factor applied on top of the linear delay for [`RetryDecision::Backoff`]
    pub backoff_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(limits::HOT_LIST_MAX_ATTEMPTS, limits::HOT_LIST_RETRY_DELAY)
    }
}

impl RetryPolicy {
    /// Create a policy; `max_attempts` is clamped to at least one
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff_multiplier: limits::BACKOFF_MULTIPLIER,
        }
    }

    pub fn with_backoff_multiplier(mut self, multiplier: u32) -> Self {
        self.backoff_multiplier = multiplier.max(1);
        self
    }

    /// Delay after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32, decision: RetryDecision) -> Duration {
        let linear = self.base_delay.saturating_mul(attempt);
        match decision {
            RetryDecision::Backoff => linear.saturating_mul(self.backoff_multiplier),
            _ => linear,
        }
    }

    /// Run `operation` with retries
    pub async fn execute<T, E, Op, Fut, C>(
        &self,
        operation: Op,
        classify: C,
    ) -> Result<T, RetryError<E>>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> RetryDecision,
        E: std::fmt::Display,
    {
        self.execute_with_cancel(&CancellationToken::new(), operation, classify)
            .await
    }

    /// Run `operation` with retries, stopping at the next decision point once
    /// `cancel` fires
    ///
    /// An attempt already in progress is allowed to finish; a pending backoff
    /// sleep is cut short.
    pub async fn execute_with_cancel<T, E, Op, Fut, C>(
        &self,
        cancel: &CancellationToken,
        mut operation: Op,
        classify: C,
    ) -> Result<T, RetryError<E>>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> RetryDecision,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        let mut last = None;

        loop {
            if cancel.is_cancelled() {
                debug!("Retry loop cancelled before attempt {}", attempt + 1);
                return Err(RetryError::Cancelled {
                    attempts: attempt,
                    last,
                });
            }

            attempt += 1;
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Operation succeeded on attempt {}", attempt);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let decision = classify(&error);
            if decision == RetryDecision::Abort {
                debug!("Fatal error on attempt {}: {}", attempt, error);
                return Err(RetryError::Fatal(error));
            }

            if attempt >= self.max_attempts {
                warn!(
                    "Giving up after {} attempt(s). Last error: {}",
                    attempt, error
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let delay = self.delay_for(attempt, decision);
            warn!(
                "Attempt {}/{} failed: {}. Retrying in {}ms",
                attempt,
                self.max_attempts,
                error,
                delay.as_millis()
            );
            last = Some(error);

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Retry backoff interrupted by cancellation");
                    return Err(RetryError::Cancelled { attempts: attempt, last });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Classify a source failure
///
/// Connection problems retry normally, throttling and server errors back off
/// harder, and everything else aborts.
pub fn classify_source_error(error: &SourceError) -> RetryDecision {
    match error {
        SourceError::Transport { .. } | SourceError::Timeout { .. } => RetryDecision::Retry,
        SourceError::RateLimited | SourceError::ServerRejected { .. } => RetryDecision::Backoff,
        SourceError::ClientError { .. } | SourceError::Decode { .. } | SourceError::Cancelled => {
            RetryDecision::Abort
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn flaky(
        calls: Arc<AtomicU32>,
        failures: u32,
        error: SourceError,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<u32, SourceError>> + Send>>
    {
        move || {
            let calls = calls.clone();
            let error = error.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= failures {
                    Err(error)
                } else {
                    Ok(n)
                }
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_k_failures() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = policy
            .execute(
                flaky(calls.clone(), 3, SourceError::transport("reset")),
                classify_source_error,
            )
            .await;

        assert_eq!(result, Ok(4));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 1s + 2s + 3s of linear backoff
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_exhausts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let calls = Arc::new(AtomicU32::new(0));

        let result = policy
            .execute(
                flaky(calls.clone(), u32::MAX, SourceError::Timeout { seconds: 1 }),
                classify_source_error,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 3,
                last: SourceError::Timeout { seconds: 1 }
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_aborts_after_one_call() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = policy
            .execute(
                flaky(calls.clone(), u32::MAX, SourceError::ClientError { status: 404 }),
                classify_source_error,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            result,
            Err(RetryError::Fatal(SourceError::ClientError { status: 404 }))
        );
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_backs_off_longer() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = policy
            .execute(
                flaky(calls.clone(), 2, SourceError::RateLimited),
                classify_source_error,
            )
            .await;

        assert_eq!(result, Ok(3));
        // (1s + 2s) doubled
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_backoff() {
        let policy = RetryPolicy::new(5, Duration::from_secs(10));
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = policy
            .execute_with_cancel(
                &cancel,
                flaky(calls.clone(), u32::MAX, SourceError::transport("down")),
                classify_source_error,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 1, .. })));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = policy
            .execute_with_cancel(
                &cancel,
                flaky(calls.clone(), 0, SourceError::transport("unused")),
                classify_source_error,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            result,
            Err(RetryError::Cancelled {
                attempts: 0,
                last: None
            })
        );
    }

    #[test]
    fn test_delay_and_clamping() {
        let policy = RetryPolicy::new(0, Duration::from_millis(500));
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(
            policy.delay_for(3, RetryDecision::Retry),
            Duration::from_millis(1500)
        );
        assert_eq!(
            policy.delay_for(3, RetryDecision::Backoff),
            Duration::from_millis(3000)
        );
    }

    #[test]
    fn test_source_classification() {
        assert_eq!(
            classify_source_error(&SourceError::transport("x")),
            RetryDecision::Retry
        );
        assert_eq!(
            classify_source_error(&SourceError::ServerRejected { status: 502 }),
            RetryDecision::Backoff
        );
        assert_eq!(
            classify_source_error(&SourceError::Decode { reason: "x".into() }),
            RetryDecision::Abort
        );
    }
}
