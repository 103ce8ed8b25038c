//! Scanner tunables.

use std::time::Duration;

use crate::queue::DEFAULT_QUEUE_CAPACITY;
use crate::session::DEFAULT_BACKOFF_CEILING_SECS;

/// Default delay between remote queries of one session (seconds).
///
/// The service answers faster queries with empty results instead of an
/// explicit throttling error, so going lower silently loses data.
pub const DEFAULT_PACING_INTERVAL_SECS: u64 = 5;

/// Default subdivision level of scanned cells.
///
/// Level 16 cells are roughly 600 m wide at the equator.
pub const DEFAULT_SUBDIVISION_LEVEL: u8 = 16;

/// Default number of queries a login ticket must still cover.
pub const DEFAULT_BATCH_SIZE: u32 = 10;

/// Tunable parameters of the scanning engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Delay before every remote query of a session; also the base backoff.
    pub pacing_interval: Duration,
    /// Cell granularity used for area coverage.
    pub subdivision_level: u8,
    /// Producer/consumer backpressure bound.
    pub queue_capacity: usize,
    /// Maximum failure backoff.
    pub backoff_ceiling: Duration,
    /// Queries a ticket must still be valid for before it is reused.
    pub batch_size: u32,
    /// Fixed delay between login attempts.
    pub login_retry_delay: Duration,
    /// Cap on consecutive login attempts for one cell; `None` retries forever.
    pub max_login_attempts: Option<u32>,
    /// Whether sessions start after a random fraction of the pacing interval.
    pub start_jitter: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            pacing_interval: Duration::from_secs(DEFAULT_PACING_INTERVAL_SECS),
            subdivision_level: DEFAULT_SUBDIVISION_LEVEL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            backoff_ceiling: Duration::from_secs(DEFAULT_BACKOFF_CEILING_SECS),
            batch_size: DEFAULT_BATCH_SIZE,
            login_retry_delay: Duration::from_secs(DEFAULT_PACING_INTERVAL_SECS),
            max_login_attempts: None,
            start_jitter: true,
        }
    }
}

impl ScanConfig {
    /// Minimum remaining ticket validity before a session logs in again.
    ///
    /// A batch of `batch_size` queries at one per `pacing_interval + 1s`.
    pub fn session_margin(&self) -> Duration {
        (self.pacing_interval + Duration::from_secs(1)).saturating_mul(self.batch_size)
    }

    /// Set the pacing interval.
    pub fn with_pacing_interval(mut self, interval: Duration) -> Self {
        self.pacing_interval = interval;
        self
    }

    /// Set the subdivision level.
    pub fn with_subdivision_level(mut self, level: u8) -> Self {
        self.subdivision_level = level;
        self
    }

    /// Set the backoff ceiling.
    pub fn with_backoff_ceiling(mut self, ceiling: Duration) -> Self {
        self.backoff_ceiling = ceiling;
        self
    }

    /// Set the login retry delay.
    pub fn with_login_retry_delay(mut self, delay: Duration) -> Self {
        self.login_retry_delay = delay;
        self
    }

    /// Cap consecutive login attempts.
    pub fn with_max_login_attempts(mut self, attempts: u32) -> Self {
        self.max_login_attempts = Some(attempts);
        self
    }

    /// Enable or disable the random start delay.
    pub fn with_start_jitter(mut self, enabled: bool) -> Self {
        self.start_jitter = enabled;
        self
    }
}
