//! Retry signals
//!
//! A retry signal decides when the next attempt of a failed operation may
//! start. The login loop of the HTTP client only ever waits on a signal, so
//! tests and embedders can replace the wall-clock pause with anything else.

use async_trait::async_trait;
use std::time::Duration;

use crate::backoff::{BackoffCalculator, BackoffStrategy};

/// Provider of "you may retry now" events
#[async_trait]
pub trait RetrySignal: Send + Sync {
    /// Resolves when the retry following the failed `attempt` (1-indexed) may start
    async fn wait(&self, attempt: u32);
}

/// Waits for the delay computed by a [`BackoffCalculator`]
#[derive(Debug)]
pub struct BackoffSignal {
    calculator: BackoffCalculator,
}

impl BackoffSignal {
    pub fn new(calculator: BackoffCalculator) -> Self {
        Self { calculator }
    }

    /// Pause for the same duration before every retry
    pub fn fixed(delay: Duration) -> Self {
        Self::new(BackoffCalculator::new(
            BackoffStrategy::Fixed,
            delay,
            delay,
            false,
        ))
    }
}

impl Default for BackoffSignal {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}

#[async_trait]
impl RetrySignal for BackoffSignal {
    async fn wait(&self, attempt: u32) {
        tokio::time::sleep(self.calculator.calculate_delay(attempt)).await;
    }
}

/// Signal that is always ready
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateSignal;

#[async_trait]
impl RetrySignal for ImmediateSignal {
    async fn wait(&self, _attempt: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_fixed_signal_waits_for_delay() {
        let signal = BackoffSignal::fixed(Duration::from_secs(1));
        let start = Instant::now();

        signal.wait(1).await;

        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_signal_does_not_wait() {
        let start = Instant::now();

        ImmediateSignal.wait(42).await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
