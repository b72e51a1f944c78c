//! Convergence waiter.
//!
//! Polls a describe closure through the bounded retry loop until the
//! observed state reaches the policy's target set. Each describe is one
//! attempt:
//!
//! - target state: success (after `target_occurrences` in a row)
//! - pending state: retryable, poll again after the interval
//! - any other state: fatal, ends the wait as unexpected
//! - describe error: classified, retried or surfaced as fatal
//!
//! Observations are strictly sequential and the first one is taken
//! immediately, so an operation that completed synchronously returns
//! without sleeping.

use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use crate::classify::{Classification, Classify};
use crate::context::WaitContext;
use crate::error::{RetryError, WaitError};
use crate::policy::{ConvergencePolicy, NotFoundPolicy, Observation};
use crate::retry::{Attempted, Outcome, retry};

/// A successful wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converged<S> {
    /// The observation that satisfied the policy
    pub observed: Observation<S>,
    /// Describe calls made
    pub attempts: u32,
    /// Time from the first describe to convergence
    pub elapsed: Duration,
}

impl<S> Converged<S> {
    /// The target state reached, or `None` when the resource vanished and
    /// the policy counts that as success.
    pub fn state(&self) -> Option<&S> {
        self.observed.state()
    }
}

/// Why an attempt did not finish the wait.
enum Step<S, E> {
    Pending(Observation<S>),
    Unexpected(Observation<S>),
    Remote(E),
}

impl<S, E> Step<S, E> {
    fn into_remote(self) -> Option<E> {
        match self {
            Self::Remote(error) => Some(error),
            Self::Pending(_) | Self::Unexpected(_) => None,
        }
    }
}

impl<S: fmt::Display, E: fmt::Display> fmt::Display for Step<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending(observed) => write!(f, "still {observed}"),
            Self::Unexpected(observed) => write!(f, "unexpected state {observed}"),
            Self::Remote(error) => write!(f, "{error}"),
        }
    }
}

enum Verdict {
    Target,
    Pending,
    Unexpected,
}

/// Poll `observe` until the resource converges or the wait fails.
///
/// Describe errors are labelled by `classifier`; retryable ones are
/// absorbed until the deadline, fatal ones end the wait immediately.
pub fn wait<S, E, C, F>(
    policy: &ConvergencePolicy<S>,
    classifier: &C,
    ctx: &WaitContext<'_>,
    mut observe: F,
) -> Result<Converged<S>, WaitError<S, E>>
where
    S: Eq + Hash + Clone + fmt::Debug + fmt::Display,
    E: fmt::Display,
    C: Classify<E> + ?Sized,
    F: FnMut() -> Result<Observation<S>, E>,
{
    let occurrences = policy.target_occurrences();
    let mut last_state: Option<Observation<S>> = None;
    let mut streak = 0u32;
    let mut not_found_seen = 0u32;

    let result = retry(&policy.retry_config(), ctx, || {
        let observed = match observe() {
            Ok(observed) => observed,
            Err(error) => {
                streak = 0;
                not_found_seen = 0;
                return match classifier.classify(&error) {
                    Classification::Retryable => {
                        log::warn!("describe failed, will retry: {error}");
                        Outcome::Retryable(Step::Remote(error))
                    }
                    Classification::Fatal => Outcome::Fatal(Step::Remote(error)),
                };
            }
        };

        log::debug!("observed {observed}");
        last_state = Some(observed.clone());

        match judge(policy, &observed, &mut not_found_seen) {
            Verdict::Target => {
                streak += 1;
                if streak >= occurrences {
                    Outcome::Success(observed)
                } else {
                    log::debug!("target seen {streak}/{occurrences} times");
                    Outcome::Retryable(Step::Pending(observed))
                }
            }
            Verdict::Pending => {
                streak = 0;
                Outcome::Retryable(Step::Pending(observed))
            }
            Verdict::Unexpected => Outcome::Fatal(Step::Unexpected(observed)),
        }
    });

    match result {
        Ok(Attempted {
            value,
            attempts,
            elapsed,
        }) => {
            log::info!("converged on {value} after {attempts} attempts ({elapsed:?})");
            Ok(Converged {
                observed: value,
                attempts,
                elapsed,
            })
        }
        Err(RetryError::Fatal {
            error,
            attempts,
            elapsed,
        }) => match error {
            Step::Remote(error) => {
                log::warn!("describe failed fatally after {attempts} attempts ({elapsed:?}): {error}");
                Err(WaitError::Fatal {
                    error,
                    last_state,
                    attempts,
                    elapsed,
                })
            }
            // Pending steps are only ever retryable
            Step::Unexpected(observed) | Step::Pending(observed) => {
                log::warn!(
                    "unexpected state {observed} after {attempts} attempts ({elapsed:?})"
                );
                Err(WaitError::UnexpectedState {
                    observed,
                    attempts,
                    elapsed,
                })
            }
        },
        Err(RetryError::Timeout {
            last_error,
            attempts,
            elapsed,
        }) => {
            log::warn!(
                "timed out after {elapsed:?} ({attempts} attempts), last observed {}",
                last_state
                    .as_ref()
                    .map_or_else(|| "nothing".to_string(), ToString::to_string)
            );
            Err(WaitError::TimedOut {
                last_state,
                last_error: last_error.and_then(Step::into_remote),
                attempts,
                elapsed,
            })
        }
        Err(RetryError::Cancelled {
            attempts, elapsed, ..
        }) => {
            log::info!("wait cancelled after {elapsed:?} ({attempts} attempts)");
            Err(WaitError::Cancelled {
                last_state,
                attempts,
                elapsed,
            })
        }
    }
}

fn judge<S>(
    policy: &ConvergencePolicy<S>,
    observed: &Observation<S>,
    not_found_seen: &mut u32,
) -> Verdict
where
    S: Eq + Hash + fmt::Debug,
{
    let Observation::Found(state) = observed else {
        *not_found_seen += 1;
        return match policy.not_found() {
            NotFoundPolicy::Target => Verdict::Target,
            NotFoundPolicy::Unexpected => Verdict::Unexpected,
            NotFoundPolicy::Tolerate { checks } if *not_found_seen <= checks => {
                log::debug!("not found ({not_found_seen}/{checks} tolerated)");
                Verdict::Pending
            }
            NotFoundPolicy::Tolerate { .. } => Verdict::Unexpected,
        };
    };

    *not_found_seen = 0;
    if policy.is_target(state) {
        Verdict::Target
    } else if policy.is_pending(state) {
        Verdict::Pending
    } else {
        Verdict::Unexpected
    }
}
