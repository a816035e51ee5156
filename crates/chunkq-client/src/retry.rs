//! Retry Logic with Exponential Backoff
//!
//! Two kinds of waiting happen in the client:
//!
//! - **Transport retries**: a request failed with a transient error
//!   (connection refused, timeout, 502/503/504).
//!   [`retry_with_jittered_backoff`] resends it following a [`RetryPolicy`].
//! - **Idle polling**: the consumer is caught up. [`PollBackoff`] spaces out
//!   the next reads while no data arrives and snaps back as soon as some does.
//!
//! ```text
//! RetryPolicy { max_retries: 5, initial_backoff: 100ms, multiplier: 2.0 }
//!
//!   Attempt 1: immediate
//!   Attempt 2: wait 100ms
//!   Attempt 3: wait 200ms
//!   Attempt 4: wait 400ms
//!   ...capped at max_backoff
//! ```
//!
//! ## Examples
//!
//! ```ignore
//! use chunkq_client::retry::{retry_with_jittered_backoff, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! retry_with_jittered_backoff(&policy, || client.post_once(url, body.clone())).await?;
//! ```

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::ClientError;

/// Retry policy configuration for exponential backoff.
///
/// ```text
/// backoff = min(initial_backoff * multiplier^attempt, max_backoff)
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: usize,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential growth
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_retries: usize,
        initial_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
            backoff_multiplier,
        }
    }

    /// Backoff before retry number `attempt` (0-indexed).
    pub fn backoff(&self, attempt: usize) -> Duration {
        let backoff_ms =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let backoff = Duration::from_millis(backoff_ms as u64);
        backoff.min(self.max_backoff)
    }
}

/// Retry `operation` while it fails with a retryable [`ClientError`],
/// waiting the policy's backoff with ±25% random jitter.
///
/// ```text
/// jittered_backoff = backoff * (0.75 + random(0.0, 0.5))
/// ```
///
/// Non-retryable errors are returned immediately; after `max_retries`
/// retries the last error is returned.
pub async fn retry_with_jittered_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempt = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                if !err.is_retryable() {
                    debug!(error = %err, "Non-retryable error, giving up");
                    return Err(err);
                }

                if attempt >= policy.max_retries {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = policy.max_retries,
                        error = %err,
                        "Max retries exhausted, giving up"
                    );
                    return Err(err);
                }

                let backoff = jitter(policy.backoff(attempt));
                warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    backoff_ms = backoff.as_millis(),
                    error = %err,
                    "Retryable error, backing off"
                );
                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

fn jitter(backoff: Duration) -> Duration {
    let factor = 0.75 + (rand::random::<f64>() * 0.5); // 0.75-1.25x
    Duration::from_millis((backoff.as_millis() as f64 * factor) as u64)
}

/// Wait schedule for a consumer that is caught up.
///
/// Each idle poll doubles the wait up to `max`; [`PollBackoff::reset`] goes
/// back to `initial` once data shows up again.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(10), Duration::from_millis(500))
    }
}

impl PollBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            current: initial,
        }
    }

    /// The wait for this idle poll; advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    /// Sleep for [`PollBackoff::next_delay`].
    pub async fn wait(&mut self) {
        sleep(self.next_delay()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn unavailable() -> ClientError {
        ClientError::Server {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "restarting".to_string(),
        }
    }

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy::new(
            max_retries,
            Duration::from_millis(1),
            Duration::from_millis(10),
            2.0,
        )
    }

    // ========================================================================
    // RetryPolicy
    // ========================================================================

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(100));
        assert_eq!(policy.max_backoff, Duration::from_secs(30));
        assert_eq!(policy.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_backoff_exponential_growth_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
        assert_eq!(policy.backoff(4), Duration::from_millis(1600));
    }

    #[test]
    fn test_backoff_max_cap() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        };
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(4), Duration::from_secs(10));
        assert_eq!(policy.backoff(20), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_bounds() {
        for _ in 0..100 {
            let jittered = jitter(Duration::from_millis(1000));
            assert!(jittered >= Duration::from_millis(750));
            assert!(jittered <= Duration::from_millis(1250));
        }
    }

    // ========================================================================
    // retry_with_jittered_backoff
    // ========================================================================

    #[tokio::test]
    async fn test_retry_with_jittered_backoff_immediate_success() {
        let policy = RetryPolicy::default();
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result = retry_with_jittered_backoff(&policy, || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Ok::<i32, ClientError>(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_with_jittered_backoff_eventual_success() {
        let policy = fast_policy(5);
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result = retry_with_jittered_backoff(&policy, || {
            let attempts = attempts_clone.clone();
            async move {
                let count = attempts.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err(unavailable())
                } else {
                    Ok::<i32, ClientError>(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_with_jittered_backoff_non_retryable_immediate_fail() {
        let policy = RetryPolicy::default();
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result = retry_with_jittered_backoff(&policy, || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<i32, ClientError>(ClientError::Server {
                    status: StatusCode::BAD_REQUEST,
                    message: "invalid category name".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(
            result,
            Err(ClientError::Server {
                status: StatusCode::BAD_REQUEST,
                ..
            })
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_with_jittered_backoff_exhausted() {
        let policy = fast_policy(2);
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result = retry_with_jittered_backoff(&policy, || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<i32, ClientError>(unavailable())
            }
        })
        .await;

        assert!(result.is_err());
        // Initial attempt + 2 retries = 3 total
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    // ========================================================================
    // PollBackoff
    // ========================================================================

    #[test]
    fn test_poll_backoff_doubles_and_caps() {
        let mut poll = PollBackoff::new(Duration::from_millis(10), Duration::from_millis(50));
        assert_eq!(poll.next_delay(), Duration::from_millis(10));
        assert_eq!(poll.next_delay(), Duration::from_millis(20));
        assert_eq!(poll.next_delay(), Duration::from_millis(40));
        assert_eq!(poll.next_delay(), Duration::from_millis(50));
        assert_eq!(poll.next_delay(), Duration::from_millis(50));

        poll.reset();
        assert_eq!(poll.next_delay(), Duration::from_millis(10));
    }

    #[test]
    fn test_poll_backoff_max_below_initial() {
        let mut poll = PollBackoff::new(Duration::from_millis(100), Duration::from_millis(10));
        assert_eq!(poll.next_delay(), Duration::from_millis(100));
        assert_eq!(poll.next_delay(), Duration::from_millis(100));
    }
}
