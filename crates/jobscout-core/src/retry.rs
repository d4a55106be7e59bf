//! Retry with exponential backoff and jitter for source fetchers.
//!
//! Every fetcher applies a [`RetryPolicy`] to its own requests before it
//! surfaces a failure. The search service never re-invokes a fetcher.
//!
//! Default schedule (3 attempts, so at most 2 waits):
//!
//! | After attempt | Wait                              |
//! |---------------|-----------------------------------|
//! | 1             | 2 s + uniform jitter in [0, 2 s)  |
//! | 2             | 4 s + uniform jitter in [0, 2 s)  |
//!
//! Each wait is capped at 10 s. Rate limiting, parse failures and invalid
//! configuration are returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::AppError;
use crate::models::SourceId;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Maximum random jitter added on top of the exponential delay.
    pub jitter: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            jitter: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            jitter: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Exponential part of the wait after `attempt` (1-indexed), capped.
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(10);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        std::cmp::min(delay, self.max_delay)
    }

    /// Full wait after `attempt` (1-indexed): exponential delay plus jitter, capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for_attempt(attempt);
        let jitter = if self.jitter.is_zero() {
            Duration::ZERO
        } else {
            self.jitter.mul_f64(rand::random::<f64>())
        };
        std::cmp::min(base + jitter, self.max_delay)
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_attempts` is exhausted. The last error is returned as-is.
    pub async fn run<T, F, Fut>(&self, source: &SourceId, mut operation: F) -> Result<T, AppError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 1u32;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !err.is_retryable() || attempt >= self.max_attempts {
                        if attempt > 1 {
                            tracing::warn!(
                                %source,
                                attempt,
                                kind = %err.kind(),
                                error = %err,
                                "Giving up on source"
                            );
                        }
                        return Err(err);
                    }
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        %source,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient source error, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn instant_policy() -> RetryPolicy {
        RetryPolicy::default()
            .with_base_delay(Duration::ZERO)
            .with_jitter(Duration::ZERO)
    }

    #[test]
    fn default_schedule_is_bounded() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        for _ in 0..100 {
            let first = policy.delay_for_attempt(1);
            assert!(first >= Duration::from_secs(2));
            assert!(first < Duration::from_secs(4));

            let second = policy.delay_for_attempt(2);
            assert!(second >= Duration::from_secs(4));
            assert!(second < Duration::from_secs(6));
        }
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(policy.base_delay_for_attempt(4), Duration::from_secs(10));
        for _ in 0..50 {
            assert!(policy.delay_for_attempt(6) <= Duration::from_secs(10));
        }
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = instant_policy()
            .run(&SourceId::new("test"), |_| {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(AppError::NetworkError("reset".into()))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let err = instant_policy()
            .run(&SourceId::new("test"), |_| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(AppError::NetworkError("down".into()))
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NetworkError(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limit_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let err = instant_policy()
            .run(&SourceId::new("test"), |_| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(AppError::RateLimited("captcha page".into()))
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RateLimited(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn attempt_number_is_passed_through() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let s = seen.clone();
        let _ = instant_policy()
            .run(&SourceId::new("test"), |attempt| {
                s.lock().unwrap().push(attempt);
                async move { Err::<(), _>(AppError::Timeout(Duration::from_secs(1))) }
            })
            .await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn no_retry_is_single_attempt() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
    }
}
