//! Process-wide outbound rate limiting.
//!
//! A token bucket refilled continuously at `requests_per_second` and capped
//! at `burst`. The limiter is a cheap handle: clones share one bucket, so a
//! single limiter can gate every wait running in the process.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::clock::{Clock, Sleep};
use crate::error::PolicyError;

/// Shortest sleep between refill checks.
const MIN_BACKOFF: Duration = Duration::from_millis(1);

/// Token bucket parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained rate
    pub requests_per_second: f64,
    /// Bucket capacity; also the number of calls allowed back to back
    pub burst: u32,
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if !self.requests_per_second.is_finite() || self.requests_per_second <= 0.0 {
            return Err(PolicyError::InvalidRate {
                rate: self.requests_per_second,
            });
        }
        if self.burst == 0 {
            return Err(PolicyError::ZeroBurst);
        }
        Ok(())
    }
}

/// Result of a blocking acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Granted,
    Cancelled,
    /// No token became available before the caller's deadline
    DeadlineReached,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Option<Instant>,
}

/// Shared token bucket.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    bucket: Arc<Mutex<Bucket>>,
}

impl RateLimiter {
    /// Create a limiter with a full bucket.
    pub fn new(config: RateLimitConfig) -> Result<Self, PolicyError> {
        config.validate()?;
        Ok(Self {
            config,
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: f64::from(config.burst),
                last_refill: None,
            })),
        })
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Take a token if one is available at `now`.
    ///
    /// On failure returns how long until the next token.
    pub fn try_acquire(&self, now: Instant) -> Result<(), Duration> {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(last) = bucket.last_refill {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            bucket.tokens = elapsed
                .mul_add(self.config.requests_per_second, bucket.tokens)
                .min(f64::from(self.config.burst));
        }
        bucket.last_refill = Some(now);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let needed = 1.0 - bucket.tokens;
            let wait = Duration::from_secs_f64(needed / self.config.requests_per_second);
            Err(wait.max(MIN_BACKOFF))
        }
    }

    /// Block until a token is available.
    ///
    /// Sleeps through `clock` so cancellation interrupts the wait, and never
    /// sleeps past `deadline`.
    pub fn acquire(
        &self,
        clock: &dyn Clock,
        cancel: &CancelToken,
        deadline: Option<Instant>,
    ) -> Acquire {
        loop {
            if cancel.is_cancelled() {
                return Acquire::Cancelled;
            }

            let now = clock.now();
            let wait = match self.try_acquire(now) {
                Ok(()) => return Acquire::Granted,
                Err(wait) => wait,
            };

            let wait = match deadline {
                Some(deadline) if now >= deadline => return Acquire::DeadlineReached,
                Some(deadline) => wait.min(deadline - now),
                None => wait,
            };

            log::trace!("rate limited, waiting {wait:?}");
            if clock.sleep(wait, cancel) == Sleep::Cancelled {
                return Acquire::Cancelled;
            }
        }
    }
}
