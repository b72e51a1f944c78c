//! Error types for remote calls, retry loops and convergence waits.
//!
//! Every terminal non-success path gets its own variant so callers can
//! branch on the cause: a remote rejection, a state outside the policy,
//! running out of time, or being cancelled. Each variant carries the
//! attempt count and elapsed time of the loop that produced it.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::Observation;

/// Failure returned by a remote-call collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The remote service rejected the request with a structured error code
    #[error("service error {code}: {message}")]
    Service {
        /// Service-defined error code, e.g. `ResourceInUse.Instance`
        code: String,
        /// Human-readable message from the service
        message: String,
        /// Request id for support tickets, when the service returned one
        request_id: Option<String>,
    },

    /// The call never produced a structured answer (timeout, reset, DNS...)
    #[error("transport error: {message}")]
    Transport {
        /// Description of the transport failure
        message: String,
    },
}

impl RemoteError {
    /// Create a structured service error.
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
            request_id: None,
        }
    }

    /// Create a transport-level error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Attach a request id to a service error. Transport errors are unchanged.
    pub fn with_request_id(self, id: impl Into<String>) -> Self {
        match self {
            Self::Service { code, message, .. } => Self::Service {
                code,
                message,
                request_id: Some(id.into()),
            },
            other => other,
        }
    }

    /// The service error code, if the remote side produced one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => Some(code),
            Self::Transport { .. } => None,
        }
    }
}

/// Invalid convergence policy or rate limit configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    /// A token appears in both the pending and the target set
    #[error("state {state} is both pending and target")]
    OverlappingStates {
        /// Debug rendering of the offending token
        state: String,
    },

    /// Nothing could ever satisfy the wait
    #[error("target state set is empty")]
    EmptyTarget,

    /// A zero poll interval would hammer the remote API
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    /// Target must be observed at least once
    #[error("target occurrences must be at least 1")]
    ZeroOccurrences,

    /// Rate limiter refill rate must be positive and finite
    #[error("invalid rate limit: {rate} requests per second")]
    InvalidRate {
        /// The rejected rate
        rate: f64,
    },

    /// A bucket that holds no tokens never grants a call
    #[error("rate limit burst must be at least 1")]
    ZeroBurst,
}

/// Malformed operation descriptor text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// The primary key was empty
    #[error("operation descriptor has an empty key")]
    EmptyKey,

    /// `key#` with nothing after the separator
    #[error("operation descriptor '{0}' has an empty secondary key")]
    EmptySecondary(String),
}

/// Terminal failure of the bounded retry loop.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// An attempt failed with an error classified as fatal
    #[error("attempt {attempts} failed after {elapsed:?}: {error}")]
    Fatal {
        /// The fatal error
        error: E,
        /// Attempts made, including the fatal one
        attempts: u32,
        /// Time since the loop started
        elapsed: Duration,
    },

    /// The deadline passed before an attempt succeeded
    #[error("timed out after {elapsed:?} ({attempts} attempts)")]
    Timeout {
        /// The most recent retryable error, if any attempt ran
        last_error: Option<E>,
        /// Attempts made
        attempts: u32,
        /// Time since the loop started
        elapsed: Duration,
    },

    /// The caller cancelled the loop
    #[error("cancelled after {elapsed:?} ({attempts} attempts)")]
    Cancelled {
        /// The most recent retryable error, if any attempt ran
        last_error: Option<E>,
        /// Attempts made
        attempts: u32,
        /// Time since the loop started
        elapsed: Duration,
    },
}

impl<E> RetryError<E> {
    /// The failure category. A retry loop never ends in an unexpected state.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Fatal { .. } => FailureKind::Fatal,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Cancelled { .. } => FailureKind::Cancelled,
        }
    }

    /// Attempts made before the loop gave up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Fatal { attempts, .. }
            | Self::Timeout { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// Time from the first attempt to the exit.
    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Fatal { elapsed, .. }
            | Self::Timeout { elapsed, .. }
            | Self::Cancelled { elapsed, .. } => *elapsed,
        }
    }
}

/// Why a wait (or retry loop) did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The remote side rejected a call with a fatal error
    Fatal,
    /// The resource reached a state outside pending and target
    UnexpectedState,
    /// The deadline elapsed while still pending
    Timeout,
    /// External cancellation was observed
    Cancelled,
}

impl FailureKind {
    /// Short label used in logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fatal => "fatal remote error",
            Self::UnexpectedState => "unexpected state",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal failure of a convergence wait.
#[derive(Debug)]
pub enum WaitError<S, E> {
    /// Describe failed with an error classified as fatal
    Fatal {
        /// The fatal remote error
        error: E,
        /// Last successful observation before the failure
        last_state: Option<Observation<S>>,
        /// Describe calls made
        attempts: u32,
        /// Time since the wait started
        elapsed: Duration,
    },

    /// The resource reached a state outside both policy sets
    UnexpectedState {
        /// The offending observation
        observed: Observation<S>,
        /// Describe calls made
        attempts: u32,
        /// Time since the wait started
        elapsed: Duration,
    },

    /// The deadline elapsed while the resource was still pending
    TimedOut {
        /// Last successful observation
        last_state: Option<Observation<S>>,
        /// The transient error of the last attempt, when it failed
        last_error: Option<E>,
        /// Describe calls made
        attempts: u32,
        /// Time since the wait started
        elapsed: Duration,
    },

    /// The caller cancelled the wait
    Cancelled {
        /// Last successful observation
        last_state: Option<Observation<S>>,
        /// Describe calls made
        attempts: u32,
        /// Time since the wait started
        elapsed: Duration,
    },
}

impl<S: fmt::Display, E: fmt::Display> fmt::Display for WaitError<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal {
                error,
                last_state,
                attempts,
                elapsed,
            } => write!(
                f,
                "describe failed after {elapsed:?} ({attempts} attempts, last observed {}): {error}",
                describe_last(last_state.as_ref())
            ),
            Self::UnexpectedState {
                observed,
                attempts,
                elapsed,
            } => write!(
                f,
                "resource reached unexpected state {observed} after {elapsed:?} ({attempts} attempts)"
            ),
            Self::TimedOut {
                last_state,
                last_error,
                attempts,
                elapsed,
            } => {
                write!(
                    f,
                    "timed out after {elapsed:?} waiting for convergence ({attempts} attempts, last observed {})",
                    describe_last(last_state.as_ref())
                )?;
                if let Some(error) = last_error {
                    write!(f, ", last error: {error}")?;
                }
                Ok(())
            }
            Self::Cancelled {
                last_state,
                attempts,
                elapsed,
            } => write!(
                f,
                "wait cancelled after {elapsed:?} ({attempts} attempts, last observed {})",
                describe_last(last_state.as_ref())
            ),
        }
    }
}

impl<S, E> std::error::Error for WaitError<S, E>
where
    S: fmt::Debug + fmt::Display,
    E: fmt::Debug + fmt::Display,
{
}

impl<S, E> WaitError<S, E> {
    /// The failure category.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Fatal { .. } => FailureKind::Fatal,
            Self::UnexpectedState { .. } => FailureKind::UnexpectedState,
            Self::TimedOut { .. } => FailureKind::Timeout,
            Self::Cancelled { .. } => FailureKind::Cancelled,
        }
    }

    /// The last observation made before the wait ended.
    pub fn last_state(&self) -> Option<&Observation<S>> {
        match self {
            Self::UnexpectedState { observed, .. } => Some(observed),
            Self::Fatal { last_state, .. }
            | Self::TimedOut { last_state, .. }
            | Self::Cancelled { last_state, .. } => last_state.as_ref(),
        }
    }

    /// Describe calls made.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Fatal { attempts, .. }
            | Self::UnexpectedState { attempts, .. }
            | Self::TimedOut { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// Total time spent waiting.
    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Fatal { elapsed, .. }
            | Self::UnexpectedState { elapsed, .. }
            | Self::TimedOut { elapsed, .. }
            | Self::Cancelled { elapsed, .. } => *elapsed,
        }
    }
}

fn describe_last<S: fmt::Display>(last: Option<&Observation<S>>) -> String {
    match last {
        Some(observation) => observation.to_string(),
        None => "nothing".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_code() {
        let err = RemoteError::service("InternalError", "boom");
        assert_eq!(err.code(), Some("InternalError"));
        assert_eq!(RemoteError::transport("reset").code(), None);
    }

    #[test]
    fn test_remote_error_request_id() {
        let err = RemoteError::service("InvalidParameter", "bad").with_request_id("req-1");
        assert!(matches!(
            err,
            RemoteError::Service { request_id: Some(ref id), .. } if id == "req-1"
        ));

        let transport = RemoteError::transport("reset").with_request_id("req-2");
        assert_eq!(transport, RemoteError::transport("reset"));
    }

    #[test]
    fn test_retry_error_kind() {
        let fatal: RetryError<RemoteError> = RetryError::Fatal {
            error: RemoteError::service("AuthFailure", "denied"),
            attempts: 1,
            elapsed: Duration::ZERO,
        };
        assert_eq!(fatal.kind(), FailureKind::Fatal);

        let cancelled: RetryError<RemoteError> = RetryError::Cancelled {
            last_error: None,
            attempts: 3,
            elapsed: Duration::from_secs(2),
        };
        assert_eq!(cancelled.kind(), FailureKind::Cancelled);
        assert_eq!(cancelled.attempts(), 3);
    }

    #[test]
    fn test_wait_error_accessors() {
        let err: WaitError<String, RemoteError> = WaitError::TimedOut {
            last_state: Some(Observation::Found("1".to_string())),
            last_error: None,
            attempts: 5,
            elapsed: Duration::from_secs(5),
        };
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert_eq!(err.attempts(), 5);
        assert_eq!(err.elapsed(), Duration::from_secs(5));
        assert_eq!(
            err.last_state(),
            Some(&Observation::Found("1".to_string()))
        );
        assert!(err.to_string().contains("last observed 1"));
    }

    #[test]
    fn test_unexpected_state_message() {
        let err: WaitError<String, RemoteError> = WaitError::UnexpectedState {
            observed: Observation::NotFound,
            attempts: 2,
            elapsed: Duration::from_secs(1),
        };
        assert_eq!(err.kind(), FailureKind::UnexpectedState);
        assert!(err.to_string().contains("not found"));
    }
}
