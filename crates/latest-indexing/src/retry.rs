//! Retry policy for package processing.
//!
//! A failed package is retried until it succeeds or shutdown is requested.
//! The delay starts at `initial` and doubles up to `max`; with `initial ==
//! max` the delay is fixed.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use latest_types::Settings;

use crate::cancel::{or_cancelled, sleep_or_cancelled};
use crate::error::IndexingError;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub initial: Duration,
    /// Cap on the delay
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}

impl RetryPolicy {
    /// Same delay before every retry.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            max: delay,
        }
    }

    /// Policy from the retry settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            initial: Duration::from_secs(settings.retry_delay_secs),
            max: Duration::from_secs(settings.retry_max_delay_secs),
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.initial,
            max_interval: self.max.max(self.initial),
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };
        backoff.reset();
        backoff
    }

    /// Run `operation` until it succeeds.
    ///
    /// Returns [`IndexingError::Cancelled`] when `token` fires before an
    /// attempt, during an attempt, or while waiting between attempts. Any
    /// other error is logged and retried.
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        token: &CancellationToken,
        mut operation: F,
    ) -> Result<T, IndexingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IndexingError>>,
    {
        let mut backoff = self.backoff();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            if token.is_cancelled() {
                return Err(IndexingError::Cancelled);
            }

            let error = match or_cancelled(token, operation()).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = %label, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(IndexingError::Cancelled) => return Err(IndexingError::Cancelled),
                Err(e) => e,
            };

            let delay = backoff.next_backoff().unwrap_or(self.max);
            warn!(
                operation = %label,
                attempt,
                error = %error,
                retry_in_ms = delay.as_millis() as u64,
                "Attempt failed, retrying"
            );

            if !sleep_or_cancelled(token, delay).await {
                return Err(IndexingError::Cancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[test]
    fn test_backoff_schedule_is_capped() {
        let policy = RetryPolicy {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(5),
        };
        let mut backoff = policy.backoff();
        let delays: Vec<u64> = (0..5)
            .map(|_| backoff.next_backoff().unwrap().as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
    }

    #[test]
    fn test_fixed_schedule() {
        let mut backoff = RetryPolicy::fixed(Duration::from_secs(5)).backoff();
        for _ in 0..10 {
            assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(5)));
        }
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings {
            retry_delay_secs: 2,
            retry_max_delay_secs: 30,
            ..Default::default()
        };
        let policy = RetryPolicy::from_settings(&settings);
        assert_eq!(policy.initial, Duration::from_secs(2));
        assert_eq!(policy.max, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let policy = RetryPolicy::fixed(Duration::from_secs(5));
        let attempts = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let value = policy
            .run("pkg", &CancellationToken::new(), || {
                let attempts = attempts.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) < 3 {
                        Err(IndexingError::InvalidListing("transient".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_delay() {
        let policy = RetryPolicy::fixed(Duration::from_secs(3600));
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let result: Result<(), _> = policy
            .run("pkg", &token, || async {
                Err(IndexingError::InvalidListing("always".to_string()))
            })
            .await;

        assert!(matches!(result, Err(IndexingError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let token = CancellationToken::new();
        token.cancel();
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = RetryPolicy::default()
            .run("pkg", &token, || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert!(matches!(result, Err(IndexingError::Cancelled)));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_attempt() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let result: Result<(), _> = RetryPolicy::default()
            .run("pkg", &token, || std::future::pending())
            .await;
        assert!(matches!(result, Err(IndexingError::Cancelled)));
    }
}
