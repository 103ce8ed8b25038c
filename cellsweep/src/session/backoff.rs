//! Exponential failure backoff.

use std::time::Duration;

/// Default ceiling for the failure backoff (5 minutes).
pub const DEFAULT_BACKOFF_CEILING_SECS: u64 = 300;

/// Doubling delay between failed scan attempts, capped at a ceiling.
///
/// After K consecutive failures the K-th delay is
/// `min(base * 2^(K-1), ceiling)`; a success resets it to `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Backoff {
    /// Creates a backoff starting at `base`.
    ///
    /// A ceiling below `base` is raised to `base`.
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self {
            base,
            ceiling: ceiling.max(base),
            current: base,
        }
    }

    /// Delay to apply for the failure being handled now.
    ///
    /// Doubles the delay for the next failure.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.ceiling);
        delay
    }

    /// Delay the next failure would get.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Restores the base delay after a success.
    pub fn reset(&mut self) {
        self.current = self.base;
    }

    /// Base delay.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Maximum delay.
    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }
}
