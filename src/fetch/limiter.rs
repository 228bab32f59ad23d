//! Request pacing and block-rate monitoring
//!
//! [`RequestLimiter`] is a token bucket with a burst of one, shared by every
//! worker, so the aggregate request rate never exceeds the configured rate
//! by more than one request per worker. [`BlockMonitor`] watches the most
//! recent status codes for signs of blocking.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::time::Duration;

/// Shared token-bucket limiter
pub struct RequestLimiter {
    inner: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    rate_per_second: f64,
}

impl RequestLimiter {
    /// Creates a limiter issuing `rate_per_second` tokens with a burst of one
    pub fn new(rate_per_second: f64) -> Self {
        let quota = Quota::with_period(Duration::from_secs_f64(1.0 / rate_per_second))
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));
        Self {
            inner: RateLimiter::direct(quota),
            rate_per_second,
        }
    }

    /// Waits until a token is available; never fails
    pub async fn acquire(&self) {
        self.inner.until_ready().await;
    }

    pub fn rate_per_second(&self) -> f64 {
        self.rate_per_second
    }
}

impl std::fmt::Debug for RequestLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLimiter")
            .field("rate_per_second", &self.rate_per_second)
            .finish()
    }
}

/// Rolling window of recent HTTP statuses
///
/// Statuses 403 and 429 count as blocked. Escalation is only recommended
/// once the window has filled.
#[derive(Debug, Clone)]
pub struct BlockMonitor {
    window: usize,
    threshold_percent: f64,
    codes: VecDeque<u16>,
    blocked: usize,
}

/// Point-in-time view of a [`BlockMonitor`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockSnapshot {
    pub observed: usize,
    pub blocked_percent: f64,
    pub should_escalate: bool,
}

fn is_blocked(code: u16) -> bool {
    code == 403 || code == 429
}

impl BlockMonitor {
    pub fn new(window: usize, threshold_percent: f64) -> Self {
        let window = window.max(1);
        Self {
            window,
            threshold_percent,
            codes: VecDeque::with_capacity(window),
            blocked: 0,
        }
    }

    /// Records one status, evicting the oldest when the window is full
    pub fn push_status(&mut self, code: u16) {
        if self.codes.len() == self.window {
            if let Some(evicted) = self.codes.pop_front() {
                if is_blocked(evicted) {
                    self.blocked -= 1;
                }
            }
        }
        if is_blocked(code) {
            self.blocked += 1;
        }
        self.codes.push_back(code);
    }

    /// Percentage of blocked statuses among those currently in the window
    pub fn blocked_percent(&self) -> f64 {
        if self.codes.is_empty() {
            return 0.0;
        }
        self.blocked as f64 * 100.0 / self.codes.len() as f64
    }

    pub fn should_escalate(&self) -> bool {
        self.codes.len() >= self.window && self.blocked_percent() >= self.threshold_percent
    }

    pub fn snapshot(&self) -> BlockSnapshot {
        BlockSnapshot {
            observed: self.codes.len(),
            blocked_percent: self.blocked_percent(),
            should_escalate: self.should_escalate(),
        }
    }
}
