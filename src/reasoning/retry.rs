use crate::config::ReasoningConfig;
use std::time::Duration;

/// Exponential backoff for retryable capability failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ReasoningConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ReasoningConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before retry number `retry` (0-based): `initial * 2^retry`,
    /// capped at `max_backoff`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2_u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
    }

    /// Whether another attempt is allowed after `retries_done` retries.
    pub fn allows_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }
}
