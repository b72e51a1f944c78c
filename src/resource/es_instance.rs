//! Elasticsearch instance status (integer codes).

use super::{Operation, Preset, StateFamily, UnknownState, lookup};
use convergence::NotFoundPolicy;

state_tokens! {
    pub enum EsInstanceStatus {
        Normal => "1",
        Processing => "0",
        Stopped => "-1",
        Destroying => "-2",
        Destroyed => "-3",
    }
}

/// Describe may miss a fresh instance for a while
const CREATE_NOT_FOUND_CHECKS: u32 = 5;

impl StateFamily for EsInstanceStatus {
    const NAME: &'static str = "es-instance";
    const ABOUT: &'static str =
        "Elasticsearch instance (1 normal, 0 processing, -1 stopped, -2 destroying, -3 destroyed)";

    fn parse_token(token: &str) -> Result<Self, UnknownState> {
        lookup(Self::NAME, NAMES, token, Self::from_token)
    }

    fn known_tokens() -> &'static [&'static str] {
        NAMES
    }

    fn preset(operation: Operation) -> Option<Preset<Self>> {
        use EsInstanceStatus::{Destroyed, Destroying, Normal, Processing, Stopped};

        match operation {
            Operation::Create => Some(
                Preset::new(vec![Processing], vec![Normal]).with_not_found(
                    NotFoundPolicy::Tolerate {
                        checks: CREATE_NOT_FOUND_CHECKS,
                    },
                ),
            ),
            Operation::Start => Some(Preset::new(vec![Stopped, Processing], vec![Normal])),
            Operation::Stop => Some(Preset::new(vec![Normal, Processing], vec![Stopped])),
            Operation::Delete => Some(
                Preset::new(vec![Normal, Processing, Stopped, Destroying], vec![Destroyed])
                    .with_not_found(NotFoundPolicy::Target),
            ),
            Operation::Check => None,
        }
    }
}
