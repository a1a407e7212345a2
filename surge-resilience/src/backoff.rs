//! Backoff strategies for retry signals

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the pause between two attempts grows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same pause before every retry
    #[default]
    Fixed,

    /// delay = initial_delay * attempt
    Linear,

    /// delay = initial_delay * base^(attempt-1)
    Exponential {
        /// Growth factor, 2.0 doubles the pause each time
        base: f64,
    },

    /// delay = initial_delay * fib(attempt)
    Fibonacci,
}

/// Computes the pause before a retry
#[derive(Debug, Clone)]
pub struct BackoffCalculator {
    strategy: BackoffStrategy,
    initial_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl BackoffCalculator {
    pub fn new(
        strategy: BackoffStrategy,
        initial_delay: Duration,
        max_delay: Duration,
        jitter: bool,
    ) -> Self {
        Self {
            strategy,
            initial_delay,
            max_delay,
            jitter,
        }
    }

    /// Pause before retrying after the given failed attempt (1-indexed)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let capped = self.base_delay(attempt).min(self.max_delay);

        if self.jitter {
            add_jitter(capped)
        } else {
            capped
        }
    }

    fn base_delay(&self, attempt: u32) -> Duration {
        match &self.strategy {
            BackoffStrategy::Fixed => self.initial_delay,

            BackoffStrategy::Linear => self.initial_delay.saturating_mul(attempt),

            BackoffStrategy::Exponential { base } => {
                if attempt == 0 {
                    return Duration::ZERO;
                }
                let multiplier = base.powi(attempt as i32 - 1);
                scale(self.initial_delay, multiplier)
            }

            BackoffStrategy::Fibonacci => scale(self.initial_delay, fibonacci(attempt) as f64),
        }
    }
}

fn scale(delay: Duration, factor: f64) -> Duration {
    let nanos = delay.as_nanos() as f64 * factor;
    if !nanos.is_finite() || nanos >= u64::MAX as f64 {
        return Duration::MAX;
    }
    Duration::from_nanos(nanos as u64)
}

// +-20%
fn add_jitter(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.8..1.2);
    scale(delay, factor)
}

/// nth Fibonacci number (1-indexed)
fn fibonacci(n: u32) -> u64 {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    a
}
