//! Bounded retry loop.
//!
//! Calls an attempt closure until it succeeds, fails fatally, the deadline
//! passes, or the caller cancels. Attempts are spaced at least
//! `min_interval` apart (measured start to start) and no attempt starts
//! once the deadline has been reached.

use std::fmt;
use std::time::{Duration, Instant};

use crate::classify::{Classification, Classify};
use crate::context::WaitContext;
use crate::error::RetryError;
use crate::limiter::Acquire;

/// Result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    Success(T),
    /// Try again after the minimum interval
    Retryable(E),
    /// Stop now and surface the error
    Fatal(E),
}

impl<T, E> Outcome<T, E> {
    /// Label a raw result with `classifier`.
    pub fn from_result<C>(result: Result<T, E>, classifier: &C) -> Self
    where
        C: Classify<E> + ?Sized,
    {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) => match classifier.classify(&error) {
                Classification::Retryable => Self::Retryable(error),
                Classification::Fatal => Self::Fatal(error),
            },
        }
    }
}

/// Timing for a retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Wall-clock budget for the whole loop
    pub timeout: Duration,
    /// Floor on the time between the starts of two attempts
    pub min_interval: Duration,
}

impl RetryConfig {
    pub fn new(timeout: Duration, min_interval: Duration) -> Self {
        Self {
            timeout,
            min_interval,
        }
    }
}

/// A successful value plus how long it took to get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Run `attempt` until it succeeds or the loop gives up.
///
/// Cancellation is checked before every attempt and interrupts the sleep
/// between attempts. When the context carries a rate limiter, a token is
/// taken before each attempt; waiting for it counts against the deadline.
pub fn retry<T, E, F>(
    config: &RetryConfig,
    ctx: &WaitContext<'_>,
    mut attempt: F,
) -> Result<Attempted<T>, RetryError<E>>
where
    E: fmt::Display,
    F: FnMut() -> Outcome<T, E>,
{
    let clock = ctx.clock;
    let start = clock.now();
    // An unrepresentable deadline means no deadline
    let deadline = start.checked_add(config.timeout);
    let mut attempts = 0u32;
    let mut last_error: Option<E> = None;

    loop {
        let elapsed = clock.now().saturating_duration_since(start);

        if ctx.cancel.is_cancelled() {
            log::debug!("retry loop cancelled after {attempts} attempts");
            return Err(RetryError::Cancelled {
                last_error,
                attempts,
                elapsed,
            });
        }

        if deadline_reached(deadline, clock.now()) {
            log::debug!("retry deadline reached after {attempts} attempts ({elapsed:?})");
            return Err(RetryError::Timeout {
                last_error,
                attempts,
                elapsed,
            });
        }

        if let Some(limiter) = ctx.limiter {
            match limiter.acquire(clock, ctx.cancel, deadline) {
                Acquire::Granted => {}
                // Reported by the checks at the top of the loop
                Acquire::Cancelled | Acquire::DeadlineReached => continue,
            }
        }

        let started = clock.now();
        attempts += 1;
        log::trace!("attempt {attempts}");

        match attempt() {
            Outcome::Success(value) => {
                return Ok(Attempted {
                    value,
                    attempts,
                    elapsed: clock.now().saturating_duration_since(start),
                });
            }
            Outcome::Fatal(error) => {
                return Err(RetryError::Fatal {
                    error,
                    attempts,
                    elapsed: clock.now().saturating_duration_since(start),
                });
            }
            Outcome::Retryable(error) => {
                log::debug!("attempt {attempts} not done: {error}");
                last_error = Some(error);
            }
        }

        let next = started.checked_add(config.min_interval).unwrap_or(started);
        let wake = deadline.map_or(next, |deadline| next.min(deadline));
        let now = clock.now();
        if wake > now {
            // An interrupted sleep is reported by the cancellation check
            clock.sleep(wake - now, ctx.cancel);
        }
    }
}

fn deadline_reached(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.is_some_and(|deadline| now >= deadline)
}
