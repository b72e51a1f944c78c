//! Submit-then-wait workflow over resource-specific collaborators.

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classify::Classify;
use crate::context::WaitContext;
use crate::elapsed::log_elapsed;
use crate::error::{DescriptorError, RetryError, WaitError};
use crate::policy::{ConvergencePolicy, Observation};
use crate::retry::{Outcome, RetryConfig, retry};
use crate::waiter::{Converged, wait};

/// Identity of one asynchronous remote mutation.
///
/// Rendered as `key` or `key#secondary` for resources with compound
/// identity (an instance plus a sub-resource id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationDescriptor {
    key: String,
    secondary: Option<String>,
}

impl OperationDescriptor {
    pub fn new(key: impl Into<String>) -> Result<Self, DescriptorError> {
        let key = key.into();
        if key.is_empty() {
            return Err(DescriptorError::EmptyKey);
        }
        Ok(Self {
            key,
            secondary: None,
        })
    }

    pub fn compound(
        key: impl Into<String>,
        secondary: impl Into<String>,
    ) -> Result<Self, DescriptorError> {
        let mut descriptor = Self::new(key)?;
        let secondary = secondary.into();
        if secondary.is_empty() {
            return Err(DescriptorError::EmptySecondary(descriptor.key));
        }
        descriptor.secondary = Some(secondary);
        Ok(descriptor)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn secondary(&self) -> Option<&str> {
        self.secondary.as_deref()
    }
}

impl fmt::Display for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.secondary {
            Some(secondary) => write!(f, "{}#{secondary}", self.key),
            None => f.write_str(&self.key),
        }
    }
}

impl FromStr for OperationDescriptor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('#') {
            Some((key, secondary)) => Self::compound(key, secondary),
            None => Self::new(s),
        }
    }
}

/// Resource-specific call that starts a mutation.
pub trait Submit {
    type Request;
    type Error;

    fn submit(&mut self, request: &Self::Request) -> Result<OperationDescriptor, Self::Error>;
}

/// Resource-specific read-back of a mutation's progress.
pub trait Describe {
    type State;
    type Error;

    fn describe(
        &mut self,
        descriptor: &OperationDescriptor,
    ) -> Result<Observation<Self::State>, Self::Error>;
}

/// Failure of [`submit_and_wait`].
#[derive(Debug)]
pub enum WorkflowError<S, E> {
    /// The submit call never succeeded
    Submit(RetryError<E>),
    /// The submit went through but the resource did not converge
    Wait {
        descriptor: OperationDescriptor,
        error: WaitError<S, E>,
    },
}

impl<S: fmt::Display, E: fmt::Display> fmt::Display for WorkflowError<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submit(RetryError::Fatal { error, .. }) => write!(f, "submit failed: {error}"),
            Self::Submit(error) => write!(f, "submit failed: {error}"),
            Self::Wait { descriptor, error } => write!(f, "{descriptor}: {error}"),
        }
    }
}

impl<S, E> std::error::Error for WorkflowError<S, E>
where
    S: fmt::Debug + fmt::Display,
    E: fmt::Debug + fmt::Display,
{
}

/// A converged mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed<S> {
    pub descriptor: OperationDescriptor,
    pub converged: Converged<S>,
}

/// Submit `request`, then wait for the resource it names to converge.
///
/// The submit is retried under `write_retry` with the same classifier
/// used for describe errors.
pub fn submit_and_wait<Sub, Des, C>(
    submitter: &mut Sub,
    describer: &mut Des,
    request: &Sub::Request,
    write_retry: &RetryConfig,
    policy: &ConvergencePolicy<Des::State>,
    classifier: &C,
    ctx: &WaitContext<'_>,
) -> Result<Completed<Des::State>, WorkflowError<Des::State, Sub::Error>>
where
    Sub: Submit,
    Sub::Error: fmt::Display,
    Des: Describe<Error = Sub::Error>,
    Des::State: Eq + Hash + Clone + fmt::Debug + fmt::Display,
    C: Classify<Sub::Error> + ?Sized,
{
    let descriptor = {
        let _timer = log_elapsed("submit");
        retry(write_retry, ctx, || {
            Outcome::from_result(submitter.submit(request), classifier)
        })
        .map_err(WorkflowError::Submit)?
        .value
    };
    log::info!("submitted {descriptor}");

    let _timer = log_elapsed(format!("wait for {descriptor}"));
    match wait(policy, classifier, ctx, || describer.describe(&descriptor)) {
        Ok(converged) => Ok(Completed {
            descriptor,
            converged,
        }),
        Err(error) => Err(WorkflowError::Wait { descriptor, error }),
    }
}
