//! Resource families: closed state enums for remote resources.
//!
//! Each family maps the wire tokens a describe call returns (strings for
//! some services, small integers for others) onto an enum, and knows the
//! pending/target sets for the operations it supports:
//! - Parsing rejects tokens the family does not define
//! - Presets give the default policy for create/start/stop/delete/check

use clap::ValueEnum;
use convergence::NotFoundPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use thiserror::Error;

/// Declare a family's state enum from a single token table.
///
/// Generates the enum, `NAMES` (tokens in declaration order), `as_token`,
/// `from_token` and a `Display` that prints the token.
macro_rules! state_tokens {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $token:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        const NAMES: &[&str] = &[$($token),+];

        impl $name {
            pub fn as_token(self) -> &'static str {
                match self {
                    $( Self::$variant => $token, )+
                }
            }

            fn from_token(token: &str) -> Option<Self> {
                match token {
                    $( $token => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_token())
            }
        }
    };
}

pub mod ckafka_connect;
pub mod cvm_instance;
pub mod dts_migrate_job;
pub mod es_instance;
pub mod raw;

pub use ckafka_connect::ConnectResourceStatus;
pub use cvm_instance::InstanceState;
pub use dts_migrate_job::MigrateJobStatus;
pub use es_instance::EsInstanceStatus;
pub use raw::RawState;

/// Mutation whose completion is being waited on
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Start,
    Stop,
    Delete,
    Check,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Delete => "delete",
            Self::Check => "check",
        })
    }
}

/// Which family a wait uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FamilyKind {
    CvmInstance,
    EsInstance,
    CkafkaConnect,
    DtsMigrateJob,
    Raw,
}

impl FamilyKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::CvmInstance => InstanceState::NAME,
            Self::EsInstance => EsInstanceStatus::NAME,
            Self::CkafkaConnect => ConnectResourceStatus::NAME,
            Self::DtsMigrateJob => MigrateJobStatus::NAME,
            Self::Raw => RawState::NAME,
        }
    }

    pub fn all() -> [Self; 5] {
        [
            Self::CvmInstance,
            Self::EsInstance,
            Self::CkafkaConnect,
            Self::DtsMigrateJob,
            Self::Raw,
        ]
    }

    pub fn info(self) -> FamilyInfo {
        match self {
            Self::CvmInstance => FamilyInfo::of::<InstanceState>(),
            Self::EsInstance => FamilyInfo::of::<EsInstanceStatus>(),
            Self::CkafkaConnect => FamilyInfo::of::<ConnectResourceStatus>(),
            Self::DtsMigrateJob => FamilyInfo::of::<MigrateJobStatus>(),
            Self::Raw => FamilyInfo::of::<RawState>(),
        }
    }
}

/// A token the family does not define
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {family} state '{token}'{}", expected_list(.expected))]
pub struct UnknownState {
    pub family: &'static str,
    pub token: String,
    pub expected: &'static [&'static str],
}

fn expected_list(expected: &[&str]) -> String {
    if expected.is_empty() {
        String::new()
    } else {
        format!(" (expected one of: {})", expected.join(", "))
    }
}

/// Default pending/target sets for one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset<S> {
    pub pending: Vec<S>,
    /// Empty means the wait ends when the resource is gone
    pub target: Vec<S>,
    pub not_found: NotFoundPolicy,
}

impl<S> Preset<S> {
    pub fn new(pending: Vec<S>, target: Vec<S>) -> Self {
        Self {
            pending,
            target,
            not_found: NotFoundPolicy::Unexpected,
        }
    }

    pub fn until_gone(pending: Vec<S>) -> Self {
        Self {
            pending,
            target: Vec::new(),
            not_found: NotFoundPolicy::Target,
        }
    }

    #[must_use]
    pub fn with_not_found(mut self, not_found: NotFoundPolicy) -> Self {
        self.not_found = not_found;
        self
    }
}

/// State enum for one kind of remote resource
pub trait StateFamily: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + 'static {
    /// Name used on the command line and in config
    const NAME: &'static str;

    /// One-line description for `settle families`
    const ABOUT: &'static str;

    /// Parse a wire token
    fn parse_token(token: &str) -> Result<Self, UnknownState>;

    /// Every token the family defines (empty when any token is accepted)
    fn known_tokens() -> &'static [&'static str];

    /// Default policy sets for `operation`, if the family supports it
    fn preset(operation: Operation) -> Option<Preset<Self>> {
        let _ = operation;
        None
    }
}

/// Parse every token, stopping at the first unknown one.
pub fn parse_all<F: StateFamily>(tokens: &[String]) -> Result<Vec<F>, UnknownState> {
    tokens.iter().map(|token| F::parse_token(token)).collect()
}

/// Look `token` up in a family's token table.
fn lookup<S>(
    family: &'static str,
    expected: &'static [&'static str],
    token: &str,
    find: fn(&str) -> Option<S>,
) -> Result<S, UnknownState> {
    let token = token.trim();
    find(token).ok_or_else(|| UnknownState {
            family,
            token: token.to_string(),
            expected,
        })
}

/// Summary of a family for listing
#[derive(Debug, Clone, Serialize)]
pub struct FamilyInfo {
    pub name: &'static str,
    pub about: &'static str,
    pub tokens: &'static [&'static str],
    pub operations: Vec<OperationInfo>,
}

/// Preset of one operation, rendered as tokens
#[derive(Debug, Clone, Serialize)]
pub struct OperationInfo {
    pub operation: Operation,
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub not_found: String,
}

impl FamilyInfo {
    pub fn of<F: StateFamily>() -> Self {
        let operations = [
            Operation::Create,
            Operation::Start,
            Operation::Stop,
            Operation::Delete,
            Operation::Check,
        ]
        .into_iter()
        .filter_map(|operation| {
            F::preset(operation).map(|preset| OperationInfo {
                operation,
                pending: preset.pending.iter().map(ToString::to_string).collect(),
                target: preset.target.iter().map(ToString::to_string).collect(),
                not_found: describe_not_found(preset.not_found),
            })
        })
        .collect();

        Self {
            name: F::NAME,
            about: F::ABOUT,
            tokens: F::known_tokens(),
            operations,
        }
    }
}

pub fn describe_not_found(policy: NotFoundPolicy) -> String {
    match policy {
        NotFoundPolicy::Target => "target".to_string(),
        NotFoundPolicy::Unexpected => "unexpected".to_string(),
        NotFoundPolicy::Tolerate { checks } => format!("tolerate {checks}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convergence::ConvergencePolicy;
    use std::time::Duration;

    fn check_presets<F: StateFamily>() {
        for operation in [
            Operation::Create,
            Operation::Start,
            Operation::Stop,
            Operation::Delete,
            Operation::Check,
        ] {
            let Some(preset) = F::preset(operation) else {
                continue;
            };
            let timeout = Duration::from_secs(60);
            let interval = Duration::from_secs(1);
            let built = if preset.target.is_empty() {
                assert_eq!(preset.not_found, NotFoundPolicy::Target);
                ConvergencePolicy::until_gone(preset.pending, timeout, interval)
            } else {
                ConvergencePolicy::new(preset.pending, preset.target, timeout, interval)
            };
            assert!(
                built.is_ok(),
                "{} {operation} preset is invalid: {:?}",
                F::NAME,
                built.err()
            );
        }
    }

    #[test]
    fn test_all_presets_build_valid_policies() {
        check_presets::<InstanceState>();
        check_presets::<EsInstanceStatus>();
        check_presets::<ConnectResourceStatus>();
        check_presets::<MigrateJobStatus>();
        check_presets::<RawState>();
    }

    #[test]
    fn test_known_tokens_parse() {
        fn roundtrip<F: StateFamily>() {
            for token in F::known_tokens() {
                let state = F::parse_token(token).unwrap();
                assert_eq!(state.to_string(), *token);
            }
        }
        roundtrip::<InstanceState>();
        roundtrip::<EsInstanceStatus>();
        roundtrip::<ConnectResourceStatus>();
        roundtrip::<MigrateJobStatus>();
    }

    #[test]
    fn test_family_names_match_value_enum() {
        for kind in FamilyKind::all() {
            let value = kind.to_possible_value().unwrap();
            assert_eq!(value.get_name(), kind.name());
        }
    }

    #[test]
    fn test_unknown_state_message_without_expected() {
        let err = UnknownState {
            family: "raw",
            token: String::new(),
            expected: &[],
        };
        assert_eq!(err.to_string(), "unknown raw state ''");
    }
}
