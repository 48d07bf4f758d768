//! Bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Retry policy: a fixed number of attempts with doubling waits.
///
/// Every failed attempt is followed by a wait, including the last one, so a
/// fully failed run takes `initial_delay * (2^max_attempts - 1)` (capped per
/// wait by `max_delay`). With the defaults that is 1 + 2 + 4 + 8 + 16 seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// Wait after the first failure.
    pub initial_delay: Duration,
    /// Upper bound for a single wait.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Wait after the given (1-based) failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// All attempts failed.
#[derive(Debug, Error)]
#[error("{operation} failed after {attempts} attempts")]
pub struct RetryError<E: std::error::Error + 'static> {
    pub operation: String,
    pub attempts: u32,
    /// Error of the final attempt.
    #[source]
    pub last_error: E,
}

/// Run `f` until it succeeds or the policy's attempts are used up.
///
/// # Example
///
/// ```ignore
/// let policy = RetryPolicy::default();
/// let readings = retry(policy, "InfluxDB query", || client.latest()).await?;
/// ```
pub async fn retry<F, Fut, T, E>(
    policy: RetryPolicy,
    operation: &'static str,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts,
                    backoff = ?delay,
                    error = %e,
                    "Attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;

                if attempt >= max_attempts {
                    return Err(RetryError {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last_error: e,
                    });
                }
                attempt += 1;
            }
        }
    }
}
