//! Collaborators shared by every loop in one workflow.

use crate::cancel::CancelToken;
use crate::clock::{Clock, SystemClock};
use crate::limiter::RateLimiter;

static SYSTEM_CLOCK: SystemClock = SystemClock;

/// Clock, cancellation and optional rate limiter for a retry loop or wait.
///
/// Borrowed rather than owned so one limiter and one token can be shared by
/// many concurrent waits.
#[derive(Clone, Copy)]
pub struct WaitContext<'a> {
    pub clock: &'a dyn Clock,
    pub cancel: &'a CancelToken,
    pub limiter: Option<&'a RateLimiter>,
}

impl<'a> WaitContext<'a> {
    pub fn new(clock: &'a dyn Clock, cancel: &'a CancelToken) -> Self {
        Self {
            clock,
            cancel,
            limiter: None,
        }
    }

    /// Wall-clock context.
    pub fn system(cancel: &'a CancelToken) -> Self {
        Self::new(&SYSTEM_CLOCK, cancel)
    }

    /// Gate every remote call through `limiter`.
    #[must_use]
    pub fn with_limiter(mut self, limiter: &'a RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }
}

impl std::fmt::Debug for WaitContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("limiter", &self.limiter.map(RateLimiter::config))
            .finish_non_exhaustive()
    }
}
