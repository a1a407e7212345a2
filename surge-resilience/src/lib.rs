//! Resilience patterns for Surge
//!
//! This crate provides the retry signal abstraction used to pace login
//! attempts, backoff strategies, and a bounded retry executor that honours
//! a cancellation token.

pub mod backoff;
pub mod retry;
pub mod signal;

// Re-export commonly used types
pub use backoff::{BackoffCalculator, BackoffStrategy};
pub use retry::{RetryError, RetryExecutor, RetryPolicy, Retryable};
pub use signal::{BackoffSignal, ImmediateSignal, RetrySignal};
