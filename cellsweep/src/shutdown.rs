//! Cooperative shutdown signal.
//!
//! A cloneable flag that can also interrupt sleeps. Sessions pace themselves
//! and back off with [`ShutdownSignal::sleep`], so a stop request never has
//! to wait out a multi-minute backoff interval.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct SignalInner {
    triggered: Mutex<bool>,
    wake: Condvar,
}

/// Shared stop flag with interruptible sleep.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<SignalInner>,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown and wakes every sleeper.
    pub fn trigger(&self) {
        *self.inner.triggered.lock() = true;
        self.inner.wake.notify_all();
    }

    /// Returns true once [`trigger`](Self::trigger) has been called.
    pub fn is_triggered(&self) -> bool {
        *self.inner.triggered.lock()
    }

    /// Sleeps for `duration` unless shutdown is requested first.
    ///
    /// Returns `true` if the full duration elapsed, `false` if the sleep was
    /// cut short (or never started) because of shutdown.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut triggered = self.inner.triggered.lock();

        while !*triggered {
            if self
                .inner
                .wake
                .wait_until(&mut triggered, deadline)
                .timed_out()
            {
                return !*triggered;
            }
        }

        false
    }
}
