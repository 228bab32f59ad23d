//! Retry and backoff policy

use crate::config::HttpConfig;
use std::time::Duration;

/// HTTP statuses that are retried like transport failures
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Exponential backoff with random jitter
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&HttpConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            jitter_max: Duration::from_millis(config.jitter_max_ms),
        }
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        RETRYABLE_STATUSES.contains(&status)
    }

    /// Exponential part of the delay after the given failed attempt (1-based)
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let scaled = self
            .initial_backoff
            .saturating_mul(1u32 << exponent);
        scaled.min(self.max_backoff)
    }

    /// Full delay after the given failed attempt: capped exponential plus jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter_max.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(fastrand::u64(0..=jitter_ms))
        };
        self.base_delay(attempt) + jitter
    }
}
