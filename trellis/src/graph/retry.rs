//! Retry policies for node execution.
//!
//! Applied by the node execution wrapper before a failure is recorded into
//! state. Retries stay within a branch and do not change merge semantics.

use std::time::Duration;

/// Retry policy for failed node invocations.
#[derive(Debug, Clone, Default)]
pub enum RetryPolicy {
    /// No retry; fail immediately.
    #[default]
    None,
    /// Retry with a constant delay between attempts.
    Fixed {
        /// Maximum number of retry attempts.
        max_attempts: usize,
        /// Fixed interval between retries.
        interval: Duration,
    },
    /// Retry with exponentially increasing delays.
    Exponential {
        /// Maximum number of retry attempts.
        max_attempts: usize,
        /// Interval before the first retry.
        initial_interval: Duration,
        /// Interval cap.
        max_interval: Duration,
        /// Backoff multiplier (2.0 doubles each time).
        multiplier: f64,
    },
}

impl RetryPolicy {
    /// No retries.
    pub fn none() -> Self {
        RetryPolicy::None
    }

    /// Fixed interval retry.
    pub fn fixed(max_attempts: usize, interval: Duration) -> Self {
        RetryPolicy::Fixed {
            max_attempts,
            interval,
        }
    }

    /// Exponential backoff retry.
    pub fn exponential(
        max_attempts: usize,
        initial_interval: Duration,
        max_interval: Duration,
        multiplier: f64,
    ) -> Self {
        RetryPolicy::Exponential {
            max_attempts,
            initial_interval,
            max_interval,
            multiplier,
        }
    }

    /// Whether a retry should be attempted after the given attempt number.
    pub fn should_retry(&self, attempt: usize) -> bool {
        match self {
            RetryPolicy::None => false,
            RetryPolicy::Fixed { max_attempts, .. } => attempt < *max_attempts,
            RetryPolicy::Exponential { max_attempts, .. } => attempt < *max_attempts,
        }
    }

    /// Delay before the retry for the given attempt number.
    pub fn delay(&self, attempt: usize) -> Duration {
        match self {
            RetryPolicy::None => Duration::ZERO,
            RetryPolicy::Fixed { interval, .. } => *interval,
            RetryPolicy::Exponential {
                initial_interval,
                max_interval,
                multiplier,
                ..
            } => {
                let delay_secs = initial_interval.as_secs_f64() * multiplier.powi(attempt as i32);
                Duration::from_secs_f64(delay_secs).min(*max_interval)
            }
        }
    }
}
