//! CKafka connection resource status (integer codes).

use super::{Operation, Preset, StateFamily, UnknownState, lookup};

state_tokens! {
    pub enum ConnectResourceStatus {
        Creating => "0",
        Running => "1",
        Deleting => "2",
        CreateFailed => "3",
    }
}

impl StateFamily for ConnectResourceStatus {
    const NAME: &'static str = "ckafka-connect";
    const ABOUT: &'static str =
        "CKafka connection resource (0 creating, 1 running, 2 deleting, 3 create failed)";

    fn parse_token(token: &str) -> Result<Self, UnknownState> {
        lookup(Self::NAME, NAMES, token, Self::from_token)
    }

    fn known_tokens() -> &'static [&'static str] {
        NAMES
    }

    fn preset(operation: Operation) -> Option<Preset<Self>> {
        use ConnectResourceStatus::{Creating, Deleting, Running};

        match operation {
            Operation::Create => Some(Preset::new(vec![Creating], vec![Running])),
            Operation::Delete => Some(Preset::until_gone(vec![Running, Deleting])),
            Operation::Start | Operation::Stop | Operation::Check => None,
        }
    }
}
