//! Bounded retry with exponential backoff and jitter.
//!
//! [`with_retry`] runs an async body up to `max_attempts` times. Only errors
//! whose [`Retryable::is_retryable`] returns `true` trigger another attempt;
//! anything else is returned immediately. Waiting goes through a [`Sleeper`]
//! so tests can observe the delays without a real clock.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use registrar_persistence::StorageError;
use tracing::{debug, warn};

use crate::config::RetryConfig;

/// Waits between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspends the current task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Classifies an error as worth another attempt.
pub trait Retryable {
    /// Returns `true` when a fresh attempt may succeed.
    fn is_retryable(&self) -> bool;
}

impl Retryable for StorageError {
    fn is_retryable(&self) -> bool {
        self.is_version_conflict()
    }
}

/// Outcome of a retried operation that did not succeed.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The body failed with a non-retryable error.
    Failed(E),
    /// Every attempt failed with a retryable error.
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last: E,
    },
}

/// Backoff schedule derived from a [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a policy from configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Total attempts, never less than one.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Deterministic part of the delay after the 0-based `attempt` failed:
    /// `min(base_delay * 2^attempt, max_delay)`.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.config
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay)
    }

    /// Full delay after the 0-based `attempt` failed, including jitter
    /// drawn uniformly from `0..=max_jitter`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.base_delay_for(attempt) + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let max = self.config.max_jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }

    /// Returns the underlying configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// Runs `body` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent. `body` receives the 1-based attempt number and
/// must start from fresh state on every call.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    operation: &str,
    mut body: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let max_attempts = policy.max_attempts();
    let mut attempts = 0;

    loop {
        attempts += 1;

        match body(attempts).await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(operation, attempts, "succeeded after retries");
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => return Err(RetryError::Failed(e)),
            Err(e) => {
                if attempts >= max_attempts {
                    warn!(
                        operation,
                        attempts,
                        error = %e,
                        "retry budget exhausted"
                    );
                    return Err(RetryError::Exhausted { attempts, last: e });
                }

                let delay = policy.next_delay(attempts - 1);
                warn!(
                    operation,
                    attempt = attempts,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "attempt conflicted, retrying"
                );
                sleeper.sleep(delay).await;
            }
        }
    }
}
