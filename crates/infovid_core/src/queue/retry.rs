//! Retry policy with exponential backoff.

use std::time::Duration;

use crate::config::QueueSettings;

const MAX_DELAY: Duration = Duration::from_secs(300);

/// How often and how patiently a failed job is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Delay before the second attempt; doubles after that.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    pub fn from_settings(settings: &QueueSettings) -> Self {
        Self::new(settings.attempts, settings.backoff())
    }

    /// Whether another attempt follows `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.attempts
    }

    /// Delay after failed attempt `attempt` (1-based): base, 2x base, 4x base...
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(2u32.pow(exponent))
            .min(MAX_DELAY)
    }
}
