//! Unified error types for the battle domain
//!
//! Every rejected action maps to one variant here; callers report the
//! rejection and leave battle state untouched. None of these is fatal to
//! the process - each is scoped to one battle or one action.

use thiserror::Error;

/// Unified error type for battle operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BattleError {
    /// Malformed identifiers or unknown entities, rejected immediately
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Action arrived in a lifecycle phase that does not accept it
    #[error("Stale battle: {0}")]
    StaleBattle(String),

    /// Player already holds an unanswered question
    #[error("Player already has an outstanding question")]
    AlreadyOutstanding,

    /// Player is at zero hearts and must be revived first
    #[error("Player is knocked out")]
    KnockedOut,

    /// The category's question pool could not produce a question
    #[error("No questions left in category")]
    NoQuestionsLeft,

    /// Submitted question id does not match the outstanding question
    #[error("No matching outstanding question: {0}")]
    NotFound(String),

    /// Answer arrived after the server-side deadline
    #[error("Answer deadline expired")]
    Expired,

    /// Every team is at the configured player cap
    #[error("Battle is full: {current}/{max} players per team")]
    BattleFull { current: u32, max: u32 },

    /// Revival code does not match any active knockout
    #[error("Invalid revival code")]
    InvalidCode,

    /// Knocked-out players cannot redeem their own code
    #[error("Self-revival is not allowed")]
    SelfRevival,

    /// The code was already redeemed
    #[error("Player is already revived")]
    AlreadyRevived,

    /// Player is not part of this battle
    #[error("Player not in battle: {0}")]
    PlayerNotInBattle(String),
}

impl BattleError {
    /// Creates a validation error for malformed or unknown identifiers.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a stale-battle error for actions in the wrong lifecycle phase.
    pub fn stale(msg: impl Into<String>) -> Self {
        Self::StaleBattle(msg.into())
    }

    /// True for the state-conflict family: rejected action, state unchanged.
    pub fn is_state_conflict(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }
}
