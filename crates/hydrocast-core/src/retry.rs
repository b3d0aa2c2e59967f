//! Bounded retries with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::ProviderError;

/// Retry budget for one provider call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay scale; the wait after failed attempt `n` is `2^(n-1) * base_delay`.
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the uniform jitter added to each wait.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_jitter: Duration::from_millis(300),
        }
    }

    pub const fn without_jitter(mut self) -> Self {
        self.max_jitter = Duration::ZERO;
        self
    }

    /// Wait before the next attempt, given how many attempts have failed so far.
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(30) as i32;
        let backoff = self.base_delay.as_secs_f64() * 2_f64.powi(exponent);
        let jitter = self.max_jitter.as_secs_f64() * fastrand::f64();
        Duration::from_secs_f64(backoff + jitter)
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent. Returns the last observed error.
    ///
    /// Cancellation is checked before every attempt and interrupts the
    /// backoff wait; a cancelled run returns [`ProviderError::Cancelled`].
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut failed = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }

            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            failed += 1;
            if failed >= max_attempts || !error.is_retryable() {
                return Err(error);
            }

            let delay = self.delay_after(failed);
            warn!(
                attempt = failed,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying provider call"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
