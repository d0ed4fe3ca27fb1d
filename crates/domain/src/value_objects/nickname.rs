//! Validated display-name newtype for battle participants

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::BattleError;

/// Maximum length for a player nickname
const MAX_NICKNAME_LENGTH: usize = 32;

/// A validated player nickname (non-empty, <=32 chars, trimmed)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nickname(String);

impl Nickname {
    /// Create a new validated nickname.
    ///
    /// # Errors
    ///
    /// Returns `BattleError::Validation` if the nickname is empty after
    /// trimming or exceeds 32 characters.
    pub fn new(name: impl Into<String>) -> Result<Self, BattleError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(BattleError::validation("Nickname cannot be empty"));
        }
        if trimmed.chars().count() > MAX_NICKNAME_LENGTH {
            return Err(BattleError::validation(format!(
                "Nickname cannot exceed {} characters",
                MAX_NICKNAME_LENGTH
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the nickname as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nickname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Nickname {
    type Error = BattleError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Nickname> for String {
    fn from(name: Nickname) -> String {
        name.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_whitespace() {
        let name = Nickname::new("  DragonSlayer  ").expect("valid nickname");
        assert_eq!(name.as_str(), "DragonSlayer");
    }

    #[test]
    fn test_rejects_empty() {
        assert!(Nickname::new("   ").is_err());
    }

    #[test]
    fn test_rejects_too_long() {
        assert!(Nickname::new("x".repeat(33)).is_err());
    }
}
