//! Retry bookkeeping for failed page requests

use std::time::Duration;

/// Capped cubic backoff threaded through the page retry loop
///
/// The n-th consecutive failure (counting from zero) waits
/// `min((n + 1)^3 * base, max)`. Any success resets the count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
    base: Duration,
    max: Duration,
}

impl RetryState {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            attempt: 0,
            base,
            max,
        }
    }

    /// Consecutive failures since the last success
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay to wait before the next retry
    pub fn next_delay(&self) -> Duration {
        let factor = (self.attempt as u64 + 1).saturating_pow(3);
        let millis = (self.base.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(millis).min(self.max)
    }

    /// Records a failure and returns how long to wait before retrying
    pub fn failed(&mut self) -> Duration {
        let delay = self.next_delay();
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}
