//! Time source for the engine
//!
//! The readiness wait timer and the round-trip timeouts read time through
//! [`Clock`] so tests can drive them with a [`ManualClock`].

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source
pub trait Clock: Send {
    /// Current instant
    fn now(&self) -> Instant;

    /// Wait before polling the transport again
    fn pause(&self, duration: Duration);
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that only moves when told to
///
/// Clones share the same time, so a test can keep one and hand another to
/// the engine. `pause` advances the time instead of sleeping.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    /// Start at the current instant
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Move time forward
    pub fn advance(&self, duration: Duration) {
        *self.now.lock() += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }

    fn pause(&self, duration: Duration) {
        self.advance(duration);
    }
}
