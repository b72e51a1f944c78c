//! DTS migration job status.

use super::{Operation, Preset, StateFamily, UnknownState, lookup};

state_tokens! {
    pub enum MigrateJobStatus {
        Created => "created",
        Checking => "checking",
        CheckPass => "checkPass",
        CheckNotPass => "checkNotPass",
        ReadyRun => "readyRun",
        Running => "running",
        Success => "success",
        Failed => "failed",
    }
}

impl StateFamily for MigrateJobStatus {
    const NAME: &'static str = "dts-migrate-job";
    const ABOUT: &'static str = "DTS migration job (check, then run)";

    fn parse_token(token: &str) -> Result<Self, UnknownState> {
        lookup(Self::NAME, NAMES, token, Self::from_token)
    }

    fn known_tokens() -> &'static [&'static str] {
        NAMES
    }

    fn preset(operation: Operation) -> Option<Preset<Self>> {
        use MigrateJobStatus::{CheckPass, Checking, Created, ReadyRun, Running, Success};

        match operation {
            // checkNotPass is terminal: the job needs its config fixed
            Operation::Check => Some(Preset::new(vec![Created, Checking], vec![CheckPass])),
            Operation::Start => Some(Preset::new(vec![CheckPass, ReadyRun, Running], vec![Success])),
            Operation::Create => Some(Preset::new(Vec::new(), vec![Created])),
            Operation::Stop | Operation::Delete => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_sensitive() {
        assert_eq!(
            MigrateJobStatus::parse_token("checkPass").unwrap(),
            MigrateJobStatus::CheckPass
        );
        assert!(MigrateJobStatus::parse_token("checkpass").is_err());
    }

    #[test]
    fn test_check_preset_fails_on_check_not_pass() {
        let preset = MigrateJobStatus::preset(Operation::Check).unwrap();
        assert!(!preset.pending.contains(&MigrateJobStatus::CheckNotPass));
        assert_eq!(preset.target, vec![MigrateJobStatus::CheckPass]);
    }

    #[test]
    fn test_start_preset() {
        let preset = MigrateJobStatus::preset(Operation::Start).unwrap();
        assert_eq!(preset.target, vec![MigrateJobStatus::Success]);
        assert!(!preset.pending.contains(&MigrateJobStatus::Failed));
    }
}
