//! Free-form state tokens, for services without a typed family.

use super::{StateFamily, UnknownState};
use std::fmt;

/// Any non-empty token, compared verbatim
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawState(String);

impl RawState {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RawState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateFamily for RawState {
    const NAME: &'static str = "raw";
    const ABOUT: &'static str = "Any token, compared as text (no presets)";

    fn parse_token(token: &str) -> Result<Self, UnknownState> {
        let token = token.trim();
        if token.is_empty() {
            return Err(UnknownState {
                family: Self::NAME,
                token: String::new(),
                expected: &[],
            });
        }
        Ok(Self(token.to_string()))
    }

    fn known_tokens() -> &'static [&'static str] {
        &[]
    }
}
