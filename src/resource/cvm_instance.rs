//! CVM instance lifecycle states.

use super::{Operation, Preset, StateFamily, UnknownState, lookup};
use convergence::NotFoundPolicy;

state_tokens! {
    /// Instance state as reported by `DescribeInstances`
    pub enum InstanceState {
        Pending => "PENDING",
        LaunchFailed => "LAUNCH_FAILED",
        Running => "RUNNING",
        Stopped => "STOPPED",
        Starting => "STARTING",
        Stopping => "STOPPING",
        Rebooting => "REBOOTING",
        /// Stopped and moved to the recycle bin
        Shutdown => "SHUTDOWN",
        Terminating => "TERMINATING",
    }
}

/// Not-found checks tolerated right after create, before the instance is
/// visible to reads
const CREATE_NOT_FOUND_CHECKS: u32 = 5;

impl StateFamily for InstanceState {
    const NAME: &'static str = "cvm-instance";
    const ABOUT: &'static str = "CVM instance state (string tokens)";

    fn parse_token(token: &str) -> Result<Self, UnknownState> {
        lookup(Self::NAME, NAMES, token, Self::from_token)
    }

    fn known_tokens() -> &'static [&'static str] {
        NAMES
    }

    fn preset(operation: Operation) -> Option<Preset<Self>> {
        use InstanceState::{
            Pending, Rebooting, Running, Shutdown, Starting, Stopped, Stopping, Terminating,
        };

        match operation {
            // LAUNCH_FAILED is left out so it ends the wait
            Operation::Create => Some(
                Preset::new(vec![Pending, Starting], vec![Running]).with_not_found(
                    NotFoundPolicy::Tolerate {
                        checks: CREATE_NOT_FOUND_CHECKS,
                    },
                ),
            ),
            Operation::Start => Some(Preset::new(vec![Stopped, Starting], vec![Running])),
            Operation::Stop => Some(Preset::new(vec![Running, Stopping], vec![Stopped])),
            // Recycled (SHUTDOWN) or already gone both count as deleted
            Operation::Delete => Some(
                Preset::new(
                    vec![
                        Pending, Running, Stopped, Starting, Stopping, Rebooting, Terminating,
                    ],
                    vec![Shutdown],
                )
                .with_not_found(NotFoundPolicy::Target),
            ),
            Operation::Check => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tokens() {
        assert_eq!(
            InstanceState::parse_token("RUNNING").unwrap(),
            InstanceState::Running
        );
        assert_eq!(
            InstanceState::parse_token(" LAUNCH_FAILED\n").unwrap(),
            InstanceState::LaunchFailed
        );
        assert!(InstanceState::parse_token("running").is_err());
        assert!(InstanceState::parse_token("").is_err());
    }

    #[test]
    fn test_tokens_round_trip() {
        for name in NAMES {
            let state = InstanceState::parse_token(name).unwrap();
            assert_eq!(state.as_token(), *name);
            assert_eq!(state.to_string(), *name);
        }
        assert_eq!(InstanceState::Shutdown.as_token(), "SHUTDOWN");
    }

    #[test]
    fn test_create_preset_fails_on_launch_failure() {
        let preset = InstanceState::preset(Operation::Create).unwrap();
        assert!(!preset.pending.contains(&InstanceState::LaunchFailed));
        assert!(!preset.target.contains(&InstanceState::LaunchFailed));
        assert_eq!(preset.target, vec![InstanceState::Running]);
    }

    #[test]
    fn test_delete_preset_accepts_recycled_or_gone() {
        let preset = InstanceState::preset(Operation::Delete).unwrap();
        assert_eq!(preset.target, vec![InstanceState::Shutdown]);
        assert_eq!(preset.not_found, NotFoundPolicy::Target);
        assert!(InstanceState::preset(Operation::Check).is_none());
    }
}
