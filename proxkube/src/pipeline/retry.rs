//! Bounded fixed-delay retry.
//!
//! Every failed attempt is followed by a sleep of exactly `delay`, including
//! the last one, before the last error is returned. There is no backoff and
//! no jitter: callers size their tolerance as `max_attempts * delay` (for
//! example 30 x 10s for a VM to boot).

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Number of attempts and the fixed pause between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first one.
    pub max_attempts: u32,
    /// Pause after each failed attempt, in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once()
    }
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// A single attempt with no pause.
    #[must_use]
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            delay_ms: 0,
        }
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the delay.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the delay as a [`Duration`].
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Runs `operation` under this policy.
    pub async fn run<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        retry(self.max_attempts, self.delay(), operation).await
    }
}

/// Calls `operation(attempt)` for `attempt` in `1..=max_attempts` until it
/// succeeds.
///
/// Returns the first success, or the error of the last attempt. A
/// `max_attempts` of zero still performs one attempt.
pub async fn retry<T, E, F, Fut>(max_attempts: u32, delay: Duration, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::debug!(
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Attempt failed"
                );
                tokio::time::sleep(delay).await;

                if attempt >= max_attempts {
                    return Err(e);
                }
                attempt += 1;
            }
        }
    }
}
