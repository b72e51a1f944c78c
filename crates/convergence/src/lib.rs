//! # Convergence
//!
//! Bounded retry and state convergence for remote control planes that
//! apply changes asynchronously.
//!
//! A mutation is submitted, the remote side answers with an operation id,
//! and the resource's state has to be polled until it settles. This crate
//! provides the pieces of that loop and keeps every failure distinguishable.
//!
//! ## Core Concepts
//!
//! - **Classifier**: labels a remote error as retryable or fatal from an
//!   allow-list of service error codes
//! - **Retry loop**: calls an attempt until success, fatal error, deadline
//!   or cancellation
//! - **Waiter**: polls a describe call until the observed state is in the
//!   policy's target set
//! - **Workflow**: submit through the retry loop, then wait
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use convergence::{
//!     CancelToken, ConvergencePolicy, ErrorClassifier, Observation, WaitContext, wait,
//! };
//!
//! let policy = ConvergencePolicy::new(
//!     ["PENDING", "STARTING"],
//!     ["RUNNING"],
//!     Duration::from_secs(300),
//!     Duration::from_secs(5),
//! )?;
//! let classifier = ErrorClassifier::new(["InternalError", "RequestLimitExceeded"]);
//! let cancel = CancelToken::new();
//! let ctx = WaitContext::system(&cancel);
//!
//! let converged = wait(&policy, &classifier, &ctx, || {
//!     client.describe_instance("ins-123").map(|i| Observation::Found(i.state))
//! })?;
//! println!("{} after {:?}", converged.observed, converged.elapsed);
//! ```
//!
//! ## Collaborators
//!
//! Waits take their side effects through a [`WaitContext`]:
//!
//! - [`Clock`]: time and cancellable sleep ([`SystemClock`], [`ManualClock`])
//! - [`CancelToken`]: cancellation shared with a signal handler or owner thread
//! - [`RateLimiter`]: optional token bucket shared by every wait in the process
//!
//! Resource-specific calls plug in through [`Submit`] and [`Describe`].

pub mod cancel;
pub mod classify;
pub mod clock;
pub mod context;
pub mod elapsed;
pub mod error;
pub mod limiter;
pub mod policy;
pub mod retry;
pub mod waiter;
pub mod workflow;

// Re-export main types at crate root
pub use cancel::CancelToken;
pub use classify::{Classification, ClassifierConfig, Classify, ErrorClassifier, RemoteFailure};
pub use clock::{Clock, ManualClock, Sleep, SystemClock};
pub use context::WaitContext;
pub use elapsed::{ElapsedLog, log_elapsed};
pub use error::{
    DescriptorError, FailureKind, PolicyError, RemoteError, RetryError, WaitError,
};
pub use limiter::{Acquire, RateLimitConfig, RateLimiter};
pub use policy::{ConvergencePolicy, NotFoundPolicy, Observation};
pub use retry::{Attempted, Outcome, RetryConfig, retry};
pub use waiter::{Converged, wait};
pub use workflow::{
    Completed, Describe, OperationDescriptor, Submit, WorkflowError, submit_and_wait,
};
