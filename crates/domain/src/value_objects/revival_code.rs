//! One-time revival codes
//!
//! Issued to a player at knockout and redeemable exactly once, by a
//! teammate only. The code itself is a short human-readable token so it can
//! be relayed out of band (voice, chat).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Alphabet for generated codes. No 0/O or 1/I to avoid transcription errors.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a generated revival code
const CODE_LENGTH: usize = 6;

/// A one-time token issued at knockout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevivalCode(String);

impl RevivalCode {
    /// Generate a fresh code. RNG is injected as a closure returning a value
    /// in `0..bound` so the domain stays free of RNG dependencies.
    pub fn generate(mut rng: impl FnMut(usize) -> usize) -> Self {
        let code: String = (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng(CODE_ALPHABET.len()) % CODE_ALPHABET.len()] as char)
            .collect();
        Self(code)
    }

    /// Parse a code presented for redemption. Case-insensitive.
    pub fn parse(input: &str) -> Self {
        Self(input.trim().to_ascii_uppercase())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevivalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uses_alphabet() {
        let mut counter = 0usize;
        let code = RevivalCode::generate(|bound| {
            counter += 7;
            counter % bound
        });
        assert_eq!(code.as_str().len(), CODE_LENGTH);
        assert!(code
            .as_str()
            .bytes()
            .all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(RevivalCode::parse(" ab2cde "), RevivalCode::parse("AB2CDE"));
    }
}
