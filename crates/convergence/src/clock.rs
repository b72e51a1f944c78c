//! Time source used by the retry loop and the rate limiter.
//!
//! Production code uses [`SystemClock`]. Tests use [`ManualClock`], whose
//! `sleep` advances virtual time instantly, so multi-second schedules run
//! in microseconds and elapsed times are exact.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;

/// How a sleep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sleep {
    Elapsed,
    Cancelled,
}

/// Monotonic time plus a cancellable sleep.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Sleep for `duration` unless `cancel` fires first.
    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> Sleep;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> Sleep {
        if cancel.wait_timeout(duration) {
            Sleep::Cancelled
        } else {
            Sleep::Elapsed
        }
    }
}

/// Deterministic clock for tests.
///
/// Clones share the same virtual time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move virtual time forward.
    pub fn advance(&self, duration: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += duration;
    }

    /// Virtual time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> Sleep {
        if cancel.is_cancelled() {
            return Sleep::Cancelled;
        }
        self.advance(duration);
        Sleep::Elapsed
    }
}
