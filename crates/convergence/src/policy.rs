//! Convergence policy: which observed states mean "keep polling" and which
//! mean "done".

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use crate::error::PolicyError;
use crate::retry::RetryConfig;

/// Result of one successful describe call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Observation<S> {
    /// The resource exists and reports this state
    Found(S),
    /// The remote side has no such resource
    NotFound,
}

impl<S> Observation<S> {
    pub fn state(&self) -> Option<&S> {
        match self {
            Self::Found(state) => Some(state),
            Self::NotFound => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Convert the state, keeping `NotFound` as is.
    pub fn map<T>(self, f: impl FnOnce(S) -> T) -> Observation<T> {
        match self {
            Self::Found(state) => Observation::Found(f(state)),
            Self::NotFound => Observation::NotFound,
        }
    }
}

impl<S: fmt::Display> fmt::Display for Observation<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(state) => write!(f, "{state}"),
            Self::NotFound => f.write_str("not found"),
        }
    }
}

/// What a "not found" observation means for a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotFoundPolicy {
    /// The resource disappearing is success (deletion waits)
    Target,
    /// The resource disappearing is a terminal failure
    #[default]
    Unexpected,
    /// Treat up to `checks` consecutive not-found observations as pending,
    /// for reads that lag behind a create. A found state or a failed
    /// describe call ends the run.
    Tolerate { checks: u32 },
}

/// Configuration for one convergence wait.
///
/// Pending and target sets are disjoint; any state outside both ends the
/// wait as unexpected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergencePolicy<S: Eq + Hash> {
    pending: HashSet<S>,
    target: HashSet<S>,
    timeout: Duration,
    poll_interval: Duration,
    not_found: NotFoundPolicy,
    target_occurrences: u32,
}

impl<S: Eq + Hash + fmt::Debug> ConvergencePolicy<S> {
    /// Build a policy, checking that the state sets are usable.
    pub fn new<P, T>(
        pending: P,
        target: T,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, PolicyError>
    where
        P: IntoIterator<Item = S>,
        T: IntoIterator<Item = S>,
    {
        let pending: HashSet<S> = pending.into_iter().collect();
        let target: HashSet<S> = target.into_iter().collect();

        if target.is_empty() {
            return Err(PolicyError::EmptyTarget);
        }
        if let Some(state) = pending.intersection(&target).next() {
            return Err(PolicyError::OverlappingStates {
                state: format!("{state:?}"),
            });
        }
        if poll_interval.is_zero() {
            return Err(PolicyError::ZeroPollInterval);
        }

        Ok(Self {
            pending,
            target,
            timeout,
            poll_interval,
            not_found: NotFoundPolicy::default(),
            target_occurrences: 1,
        })
    }

    /// Build a deletion policy: success is the resource disappearing.
    ///
    /// The target set is empty and "not found" counts as the target.
    /// Changing the not-found policy afterwards leaves nothing to converge
    /// on, so such a wait ends as unexpected or timed out.
    pub fn until_gone<P>(
        pending: P,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, PolicyError>
    where
        P: IntoIterator<Item = S>,
    {
        if poll_interval.is_zero() {
            return Err(PolicyError::ZeroPollInterval);
        }
        Ok(Self {
            pending: pending.into_iter().collect(),
            target: HashSet::new(),
            timeout,
            poll_interval,
            not_found: NotFoundPolicy::Target,
            target_occurrences: 1,
        })
    }

    #[must_use]
    pub fn with_not_found(mut self, not_found: NotFoundPolicy) -> Self {
        self.not_found = not_found;
        self
    }

    /// Require the target to be seen `occurrences` times in a row.
    pub fn with_target_occurrences(mut self, occurrences: u32) -> Result<Self, PolicyError> {
        if occurrences == 0 {
            return Err(PolicyError::ZeroOccurrences);
        }
        self.target_occurrences = occurrences;
        Ok(self)
    }

    pub fn is_pending(&self, state: &S) -> bool {
        self.pending.contains(state)
    }

    pub fn is_target(&self, state: &S) -> bool {
        self.target.contains(state)
    }

    pub fn pending(&self) -> &HashSet<S> {
        &self.pending
    }

    pub fn target(&self) -> &HashSet<S> {
        &self.target
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn not_found(&self) -> NotFoundPolicy {
        self.not_found
    }

    pub fn target_occurrences(&self) -> u32 {
        self.target_occurrences
    }

    /// The retry loop timing this policy implies.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.timeout, self.poll_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_policy_new() {
        let policy = ConvergencePolicy::new(["0", "1"], ["2"], secs(5), secs(1)).unwrap();
        assert!(policy.is_pending(&"0"));
        assert!(policy.is_target(&"2"));
        assert!(!policy.is_pending(&"2"));
        assert!(!policy.is_target(&"3"));
        assert_eq!(policy.not_found(), NotFoundPolicy::Unexpected);
        assert_eq!(policy.target_occurrences(), 1);
        assert_eq!(policy.retry_config(), RetryConfig::new(secs(5), secs(1)));
    }

    #[test]
    fn test_policy_rejects_overlap() {
        let err = ConvergencePolicy::new(["0", "1"], ["1"], secs(5), secs(1)).unwrap_err();
        assert_eq!(
            err,
            PolicyError::OverlappingStates {
                state: "\"1\"".to_string()
            }
        );
    }

    #[test]
    fn test_policy_rejects_empty_target() {
        let err = ConvergencePolicy::<&str>::new(["0"], [], secs(5), secs(1)).unwrap_err();
        assert_eq!(err, PolicyError::EmptyTarget);
    }

    #[test]
    fn test_policy_rejects_zero_interval() {
        let err = ConvergencePolicy::new(["0"], ["1"], secs(5), Duration::ZERO).unwrap_err();
        assert_eq!(err, PolicyError::ZeroPollInterval);
    }

    #[test]
    fn test_policy_empty_pending_is_allowed() {
        // Waiting on a single terminal state with no intermediate ones
        let policy = ConvergencePolicy::new([], [1], secs(5), secs(1)).unwrap();
        assert!(policy.pending().is_empty());
    }

    #[test]
    fn test_until_gone() {
        let policy =
            ConvergencePolicy::until_gone(["RUNNING", "TERMINATING"], secs(60), secs(2)).unwrap();
        assert!(policy.target().is_empty());
        assert_eq!(policy.not_found(), NotFoundPolicy::Target);
        assert!(policy.is_pending(&"TERMINATING"));

        let err = ConvergencePolicy::until_gone(["RUNNING"], secs(60), Duration::ZERO).unwrap_err();
        assert_eq!(err, PolicyError::ZeroPollInterval);
    }

    #[test]
    fn test_target_occurrences() {
        let policy = ConvergencePolicy::new([0], [1], secs(5), secs(1)).unwrap();
        assert_eq!(
            policy.clone().with_target_occurrences(0).unwrap_err(),
            PolicyError::ZeroOccurrences
        );
        let policy = policy.with_target_occurrences(3).unwrap();
        assert_eq!(policy.target_occurrences(), 3);
    }

    #[test]
    fn test_observation_display() {
        assert_eq!(Observation::Found("RUNNING").to_string(), "RUNNING");
        assert_eq!(Observation::<&str>::NotFound.to_string(), "not found");
        assert_eq!(Observation::Found(2).map(|n| n * 2), Observation::Found(4));
        assert!(Observation::<u8>::NotFound.is_not_found());
    }
}
