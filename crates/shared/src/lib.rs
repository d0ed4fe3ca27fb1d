//! QuizRaid Shared - wire protocol between engine and clients
//!
//! This crate contains every type exchanged over the WebSocket connection:
//! - WebSocket message types (`ClientMessage`, `ServerMessage`)
//! - Wire-format DTOs (battle status, question payloads)
//! - Wire error codes
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - serde, uuid, and the domain vocabulary
//! 2. **No business logic** - pure data types and serialization
//! 3. **Raw `uuid::Uuid` in DTOs** - domain id newtypes stay server-side;
//!    vocabulary enums (`SpeedTier`, `CombatOutcome`) come from the domain

pub mod messages;
pub mod types;

pub use messages::{ClientMessage, ServerMessage};
pub use types::{
    BattleStatusData, ErrorCode, PhaseData, PlayerStatusData, QuestionData, TeamStatusData,
};
