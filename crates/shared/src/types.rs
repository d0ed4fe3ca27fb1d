//! Wire-format DTOs shared by multiple messages

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quizraid_domain::{BattleError, BattlePhase};

/// Battle lifecycle phase as seen on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseData {
    Pending,
    Active,
    InBattle,
    Cooldown,
}

impl From<BattlePhase> for PhaseData {
    fn from(phase: BattlePhase) -> Self {
        match phase {
            BattlePhase::Pending => Self::Pending,
            BattlePhase::Active => Self::Active,
            BattlePhase::InBattle => Self::InBattle,
            BattlePhase::Cooldown => Self::Cooldown,
        }
    }
}

/// A question as delivered to a player. The correct choice never crosses
/// the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionData {
    pub id: Uuid,
    pub text: String,
    pub choices: Vec<String>,
    pub time_limit_ms: u64,
}

/// Per-team summary inside a battle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamStatusData {
    pub index: u32,
    pub player_count: u32,
    pub total_damage: u64,
}

/// Per-player summary inside a battle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStatusData {
    pub player_id: Uuid,
    pub nickname: String,
    pub team_index: u32,
    pub hearts: u32,
    pub knocked_out: bool,
    pub connected: bool,
}

/// Snapshot of a battle broadcast alongside answers and lifecycle changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleStatusData {
    pub event_boss_id: Uuid,
    pub boss_name: String,
    pub phase: PhaseData,
    pub boss_hp: u32,
    pub boss_max_hp: u32,
    pub player_count: u32,
    pub teams: Vec<TeamStatusData>,
    pub players: Vec<PlayerStatusData>,
    /// Seconds until the next fight, present only during cooldown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_battle_in_secs: Option<u64>,
}

/// Stable wire error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ParseError,
    Validation,
    StaleBattle,
    AlreadyOutstanding,
    KnockedOut,
    NoQuestionsLeft,
    NotFound,
    Expired,
    BattleFull,
    InvalidCode,
    SelfRevival,
    AlreadyRevived,
    NotInBattle,
    Internal,
}

impl From<&BattleError> for ErrorCode {
    fn from(err: &BattleError) -> Self {
        match err {
            BattleError::Validation(_) => Self::Validation,
            BattleError::StaleBattle(_) => Self::StaleBattle,
            BattleError::AlreadyOutstanding => Self::AlreadyOutstanding,
            BattleError::KnockedOut => Self::KnockedOut,
            BattleError::NoQuestionsLeft => Self::NoQuestionsLeft,
            BattleError::NotFound(_) => Self::NotFound,
            BattleError::Expired => Self::Expired,
            BattleError::BattleFull { .. } => Self::BattleFull,
            BattleError::InvalidCode => Self::InvalidCode,
            BattleError::SelfRevival => Self::SelfRevival,
            BattleError::AlreadyRevived => Self::AlreadyRevived,
            BattleError::PlayerNotInBattle(_) => Self::NotInBattle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_wire_format() {
        let json = serde_json::to_string(&ErrorCode::AlreadyOutstanding).expect("serializes");
        assert_eq!(json, "\"ALREADY_OUTSTANDING\"");
    }

    #[test]
    fn test_phase_wire_format() {
        let json = serde_json::to_string(&PhaseData::InBattle).expect("serializes");
        assert_eq!(json, "\"in-battle\"");
    }
}
