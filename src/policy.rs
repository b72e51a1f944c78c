//! Resolve a convergence policy from flags, a config profile and a family
//! preset.
//!
//! Settings are kept as raw tokens until the family is known, then parsed
//! so unknown tokens are rejected before the first describe call.

use crate::defaults::{DEFAULT_NOT_FOUND_CHECKS, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};
use crate::resource::{
    ConnectResourceStatus, EsInstanceStatus, FamilyKind, InstanceState, MigrateJobStatus,
    Operation, RawState, StateFamily, parse_all,
};
use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use convergence::{ConvergencePolicy, NotFoundPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `--not-found` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotFoundMode {
    /// A vanished resource is success
    Target,
    /// A vanished resource ends the wait
    Unexpected,
    /// Treat a few not-found reads as pending
    Tolerate,
}

impl NotFoundMode {
    pub fn into_policy(self, checks: u32) -> NotFoundPolicy {
        match self {
            Self::Target => NotFoundPolicy::Target,
            Self::Unexpected => NotFoundPolicy::Unexpected,
            Self::Tolerate => NotFoundPolicy::Tolerate { checks },
        }
    }
}

/// Policy settings before they are parsed for a family.
///
/// Unset fields fall back to a lower layer: flags over profile, profile
/// over the operation preset, preset over the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySettings {
    pub operation: Option<Operation>,
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub timeout: Option<Duration>,
    pub interval: Option<Duration>,
    pub not_found: Option<NotFoundMode>,
    pub not_found_checks: Option<u32>,
    pub occurrences: Option<u32>,
}

impl PolicySettings {
    /// Fill every unset field from `base`.
    #[must_use]
    pub fn or(self, base: Self) -> Self {
        Self {
            operation: self.operation.or(base.operation),
            pending: if self.pending.is_empty() {
                base.pending
            } else {
                self.pending
            },
            target: if self.target.is_empty() {
                base.target
            } else {
                self.target
            },
            timeout: self.timeout.or(base.timeout),
            interval: self.interval.or(base.interval),
            not_found: self.not_found.or(base.not_found),
            not_found_checks: self.not_found_checks.or(base.not_found_checks),
            occurrences: self.occurrences.or(base.occurrences),
        }
    }
}

/// Build the policy for family `F`.
pub fn build<F: StateFamily>(settings: &PolicySettings) -> Result<ConvergencePolicy<F>> {
    let preset = match settings.operation {
        Some(operation) => Some(F::preset(operation).with_context(|| {
            format!("family {} has no preset for '{operation}'", F::NAME)
        })?),
        None => None,
    };

    let pending: Vec<F> = if settings.pending.is_empty() {
        preset.as_ref().map(|p| p.pending.clone()).unwrap_or_default()
    } else {
        parse_all(&settings.pending)?
    };
    let target: Vec<F> = if settings.target.is_empty() {
        preset.as_ref().map(|p| p.target.clone()).unwrap_or_default()
    } else {
        parse_all(&settings.target)?
    };

    let checks = settings
        .not_found_checks
        .unwrap_or(DEFAULT_NOT_FOUND_CHECKS);
    let not_found = settings
        .not_found
        .map(|mode| mode.into_policy(checks))
        .or_else(|| preset.as_ref().map(|p| p.not_found))
        .unwrap_or_default();

    let timeout = settings.timeout.unwrap_or(DEFAULT_WAIT_TIMEOUT);
    let interval = settings.interval.unwrap_or(DEFAULT_POLL_INTERVAL);

    let policy = if target.is_empty() {
        if not_found != NotFoundPolicy::Target {
            bail!("no target states given (use --target, --operation, or --not-found target)");
        }
        ConvergencePolicy::until_gone(pending, timeout, interval)?
    } else {
        ConvergencePolicy::new(pending, target, timeout, interval)?.with_not_found(not_found)
    };

    match settings.occurrences {
        Some(occurrences) => Ok(policy.with_target_occurrences(occurrences)?),
        None => Ok(policy),
    }
}

/// Check that `settings` build a valid policy for `kind`.
pub fn check(kind: FamilyKind, settings: &PolicySettings) -> Result<()> {
    match kind {
        FamilyKind::CvmInstance => build::<InstanceState>(settings).map(drop),
        FamilyKind::EsInstance => build::<EsInstanceStatus>(settings).map(drop),
        FamilyKind::CkafkaConnect => build::<ConnectResourceStatus>(settings).map(drop),
        FamilyKind::DtsMigrateJob => build::<MigrateJobStatus>(settings).map(drop),
        FamilyKind::Raw => build::<RawState>(settings).map(drop),
    }
}

/// Render a policy's state set in a stable order.
pub fn sorted_tokens<'a, F: StateFamily>(states: impl IntoIterator<Item = &'a F>) -> Vec<String> {
    let mut tokens: Vec<String> = states.into_iter().map(ToString::to_string).collect();
    tokens.sort();
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_explicit_sets() {
        let settings = PolicySettings {
            pending: tokens(&["PENDING"]),
            target: tokens(&["RUNNING"]),
            ..Default::default()
        };
        let policy = build::<InstanceState>(&settings).unwrap();
        assert!(policy.is_pending(&InstanceState::Pending));
        assert!(policy.is_target(&InstanceState::Running));
        assert_eq!(policy.timeout(), DEFAULT_WAIT_TIMEOUT);
        assert_eq!(policy.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert_eq!(policy.not_found(), NotFoundPolicy::Unexpected);
    }

    #[test]
    fn test_preset_fills_sets() {
        let settings = PolicySettings {
            operation: Some(Operation::Stop),
            ..Default::default()
        };
        let policy = build::<InstanceState>(&settings).unwrap();
        assert_eq!(
            sorted_tokens(policy.pending()),
            vec!["RUNNING".to_string(), "STOPPING".to_string()]
        );
        assert_eq!(sorted_tokens(policy.target()), vec!["STOPPED".to_string()]);
    }

    #[test]
    fn test_flags_override_preset() {
        let settings = PolicySettings {
            operation: Some(Operation::Create),
            target: tokens(&["STOPPED"]),
            not_found: Some(NotFoundMode::Unexpected),
            ..Default::default()
        };
        let policy = build::<InstanceState>(&settings).unwrap();
        assert!(policy.is_target(&InstanceState::Stopped));
        assert!(policy.is_pending(&InstanceState::Pending));
        assert_eq!(policy.not_found(), NotFoundPolicy::Unexpected);
    }

    #[test]
    fn test_tolerate_uses_default_checks() {
        let settings = PolicySettings {
            target: tokens(&["1"]),
            not_found: Some(NotFoundMode::Tolerate),
            ..Default::default()
        };
        let policy = build::<EsInstanceStatus>(&settings).unwrap();
        assert_eq!(
            policy.not_found(),
            NotFoundPolicy::Tolerate {
                checks: DEFAULT_NOT_FOUND_CHECKS
            }
        );
    }

    #[test]
    fn test_delete_preset_waits_until_gone() {
        let settings = PolicySettings {
            operation: Some(Operation::Delete),
            ..Default::default()
        };
        let policy = build::<ConnectResourceStatus>(&settings).unwrap();
        assert!(policy.target().is_empty());
        assert_eq!(policy.not_found(), NotFoundPolicy::Target);
    }

    #[test]
    fn test_missing_target_is_rejected() {
        let settings = PolicySettings {
            pending: tokens(&["PENDING"]),
            ..Default::default()
        };
        let err = build::<InstanceState>(&settings).unwrap_err();
        assert!(err.to_string().contains("no target states"));
    }

    #[test]
    fn test_unsupported_operation() {
        let settings = PolicySettings {
            operation: Some(Operation::Stop),
            ..Default::default()
        };
        let err = build::<ConnectResourceStatus>(&settings).unwrap_err();
        assert!(err.to_string().contains("no preset for 'stop'"));
    }

    #[test]
    fn test_unknown_and_overlapping_tokens() {
        let unknown = PolicySettings {
            target: tokens(&["ACTIVE"]),
            ..Default::default()
        };
        assert!(check(FamilyKind::CvmInstance, &unknown).is_err());
        assert!(check(FamilyKind::Raw, &unknown).is_ok());

        let overlap = PolicySettings {
            pending: tokens(&["RUNNING"]),
            target: tokens(&["RUNNING"]),
            ..Default::default()
        };
        assert!(check(FamilyKind::CvmInstance, &overlap).is_err());
    }

    #[test]
    fn test_zero_occurrences_rejected() {
        let settings = PolicySettings {
            target: tokens(&["success"]),
            occurrences: Some(0),
            ..Default::default()
        };
        assert!(build::<MigrateJobStatus>(&settings).is_err());

        let settings = PolicySettings {
            occurrences: Some(3),
            ..settings
        };
        let policy = build::<MigrateJobStatus>(&settings).unwrap();
        assert_eq!(policy.target_occurrences(), 3);
    }

    #[test]
    fn test_or_prefers_self() {
        let flags = PolicySettings {
            timeout: Some(Duration::from_secs(30)),
            target: tokens(&["RUNNING"]),
            ..Default::default()
        };
        let profile = PolicySettings {
            timeout: Some(Duration::from_secs(600)),
            interval: Some(Duration::from_secs(2)),
            target: tokens(&["STOPPED"]),
            pending: tokens(&["STOPPING"]),
            ..Default::default()
        };
        let merged = flags.or(profile);
        assert_eq!(merged.timeout, Some(Duration::from_secs(30)));
        assert_eq!(merged.interval, Some(Duration::from_secs(2)));
        assert_eq!(merged.target, tokens(&["RUNNING"]));
        assert_eq!(merged.pending, tokens(&["STOPPING"]));
    }
}
