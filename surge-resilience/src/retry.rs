//! Retry policy and executor

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::backoff::{BackoffCalculator, BackoffStrategy};
use crate::signal::{BackoffSignal, RetrySignal};

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,

    /// Pause before the first retry
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound for any pause
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// How the pause grows
    pub backoff_strategy: BackoffStrategy,

    /// Whether to add jitter to retry delays
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(1),
            backoff_strategy: BackoffStrategy::Fixed,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Same pause before every retry
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay,
            backoff_strategy: BackoffStrategy::Fixed,
            jitter: false,
        }
    }

    /// Backoff signal that waits the delays of this policy
    pub fn signal(&self) -> BackoffSignal {
        BackoffSignal::new(BackoffCalculator::new(
            self.backoff_strategy.clone(),
            self.initial_delay,
            self.max_delay,
            self.jitter,
        ))
    }
}

/// Trait for errors that can be retried
pub trait Retryable {
    /// Whether another attempt could succeed
    fn is_retryable(&self) -> bool;
}

/// Runs an operation until it succeeds, fails permanently, runs out of
/// attempts or is cancelled
#[derive(Clone)]
pub struct RetryExecutor {
    max_attempts: u32,
    signal: Arc<dyn RetrySignal>,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl RetryExecutor {
    /// Pace retries with the given signal
    pub fn new(max_attempts: u32, signal: Arc<dyn RetrySignal>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            signal,
        }
    }

    /// Pace retries with the backoff of the policy
    pub fn from_policy(policy: &RetryPolicy) -> Self {
        Self::new(policy.max_attempts, Arc::new(policy.signal()))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Execute `f` with retry logic. `f` receives the 1-indexed attempt number.
    pub async fn execute<F, Fut, T, E>(
        &self,
        cancel: &CancellationToken,
        mut f: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let mut attempt = 1;

        loop {
            debug!("Executing attempt {} of {}", attempt, self.max_attempts);

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                outcome = f(attempt) => outcome,
            };

            let error = match outcome {
                Ok(result) => {
                    if attempt > 1 {
                        info!("Operation succeeded after {} attempts", attempt);
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                warn!("Operation failed with non-retryable error: {}", error);
                return Err(RetryError::NonRetryableError(error));
            }

            if attempt >= self.max_attempts {
                warn!("Operation failed after {} attempts: {}", attempt, error);
                return Err(RetryError::MaxAttemptsExceeded {
                    attempts: attempt,
                    last_error: error,
                });
            }

            warn!("Attempt {} failed: {}. Waiting for retry", attempt, error);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = self.signal.wait(attempt) => {}
            }

            attempt += 1;
        }
    }
}

/// Retry error types
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("Maximum retry attempts ({attempts}) exceeded. Last error: {last_error}")]
    MaxAttemptsExceeded { attempts: u32, last_error: E },

    #[error("Non-retryable error: {0}")]
    NonRetryableError(E),

    #[error("Retry loop cancelled")]
    Cancelled,
}

impl<E> RetryError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled)
    }
}
