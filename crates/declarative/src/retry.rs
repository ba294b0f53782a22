//! Retry logic with exponential backoff for retryable backend failures.

use crate::error::{BackendFailure, Failure};
use std::thread;
use std::time::Duration;

/// Bounded exponential backoff settings
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            ..Default::default()
        }
    }

    /// Delay after the given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Retries without sleeping
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            backoff_factor: 1.0,
            max_delay: Duration::ZERO,
        }
    }
}

/// Outcome of a retried operation
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, Failure>,
    pub attempts: u32,
}

/// Run `operation`, retrying retryable failures with backoff.
///
/// `on_retry` receives the attempt that just failed (1-indexed), the
/// classified failure and the delay before the next attempt.
pub fn with_retry<T, F, R>(policy: &RetryPolicy, mut on_retry: R, mut operation: F) -> Attempted<T>
where
    F: FnMut() -> Result<T, BackendFailure>,
    R: FnMut(u32, &Failure, Duration),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let failure = match operation() {
            Ok(value) => {
                return Attempted {
                    result: Ok(value),
                    attempts: attempt,
                };
            }
            Err(e) => Failure::from(e),
        };

        if !failure.is_retryable() || attempt >= max_attempts {
            return Attempted {
                result: Err(failure),
                attempts: attempt,
            };
        }

        let delay = policy.delay_for_attempt(attempt - 1);
        on_retry(attempt, &failure, delay);
        thread::sleep(delay);
    }
}
