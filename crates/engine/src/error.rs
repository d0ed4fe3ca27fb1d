//! Engine-level error type
//!
//! Wraps domain rejections and collaborator failures so WebSocket handlers
//! can map any failure onto a wire error code.

use thiserror::Error;

use quizraid_domain::BattleError;
use quizraid_shared::ErrorCode;

use crate::infrastructure::ports::PortError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Battle(#[from] BattleError),

    #[error(transparent)]
    Port(#[from] PortError),

    /// The battle task went away between lookup and send
    #[error("battle is no longer live")]
    BattleUnavailable,
}

impl EngineError {
    /// Stable code reported to clients.
    pub fn wire_code(&self) -> ErrorCode {
        match self {
            Self::Battle(err) => ErrorCode::from(err),
            Self::Port(_) => ErrorCode::Internal,
            Self::BattleUnavailable => ErrorCode::StaleBattle,
        }
    }
}
