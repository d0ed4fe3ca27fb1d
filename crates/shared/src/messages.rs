//! WebSocket message types for engine-client communication
//!
//! These types are used by both sides: the engine receives `ClientMessage`
//! and sends `ServerMessage`. Messages are externally tagged with `type`.
//!
//! ## Versioning Policy
//!
//! - New variants can be added at the end (forward compatible)
//! - Removing or renaming variants is a breaking change

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quizraid_domain::{CombatOutcome, SpeedTier};

use crate::types::{BattleStatusData, ErrorCode, QuestionData};

// =============================================================================
// Client Messages (player → engine)
// =============================================================================

/// Messages from a connected client to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Watch an event-boss lobby without fighting
    JoinBossPreview { event_boss_id: Uuid },
    /// Enter the fight for an event-boss
    JoinBossFight {
        event_boss_id: Uuid,
        nickname: String,
        /// Session token for authenticated identity; absent for guests
        #[serde(default)]
        session_token: Option<String>,
        /// Required when the event-boss is configured with a join code
        #[serde(default)]
        join_code: Option<String>,
    },
    /// Ask for the next question
    RequestQuestion { event_boss_id: Uuid },
    /// Answer the outstanding question
    SubmitAnswer {
        event_boss_id: Uuid,
        question_id: Uuid,
        choice_index: u32,
        /// Client-measured latency; server-computed elapsed time is
        /// authoritative, this is informational
        #[serde(default)]
        response_time_ms: Option<u64>,
    },
    /// Redeem a teammate's revival code
    RedeemRevival { event_boss_id: Uuid, code: String },
    /// Explicitly leave the battle roster
    LeaveBattle { event_boss_id: Uuid },
    /// Heartbeat ping
    Heartbeat,
}

// =============================================================================
// Server Messages (engine → player)
// =============================================================================

/// Messages from the engine to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Ack for a preview join, with the current lobby state
    BossPreviewJoined { status: BattleStatusData },
    /// Ack for a fight join: the caller's identity and seat
    BattleJoined {
        player_id: Uuid,
        team_index: u32,
        status: BattleStatusData,
    },
    /// Broadcast whenever the roster size changes
    PlayerCountUpdated {
        event_boss_id: Uuid,
        player_count: u32,
    },
    /// Broadcast when the first question of a fight is issued
    BattleStarted {
        event_boss_id: Uuid,
        /// Unix milliseconds
        started_at_ms: i64,
    },
    /// The requested question, to the requesting player only
    QuestionReceived {
        question: QuestionData,
        /// Unix milliseconds
        deadline_ms: i64,
    },
    /// Direct response to a submitted answer
    AnswerResult {
        correct: bool,
        damage: u32,
        response_category: SpeedTier,
        outcome: CombatOutcome,
        status: BattleStatusData,
    },
    /// Broadcast to all participants when an answer lands on the boss
    PlayerAttacked {
        event_boss_id: Uuid,
        attacker_id: Uuid,
        attacker_nickname: String,
        damage: u32,
        boss_hp: u32,
    },
    /// Broadcast when a wrong or late answer costs a heart
    PlayerLostHeart {
        event_boss_id: Uuid,
        player_id: Uuid,
        hearts_remaining: u32,
        knocked_out: bool,
    },
    /// To the affected player only: their one-time revival code
    PlayerKnockedOut { revival_code: String },
    /// Broadcast to the knocked-out player's team
    TeammateKnockedOut {
        event_boss_id: Uuid,
        player_id: Uuid,
        nickname: String,
    },
    /// Broadcast when a revival code is redeemed
    PlayerRevived {
        event_boss_id: Uuid,
        player_id: Uuid,
        revived_by: Uuid,
        hearts: u32,
    },
    /// Broadcast marking the cooldown transition
    BossDefeated {
        event_boss_id: Uuid,
        winning_team: u32,
        last_hit: Uuid,
        next_battle_in_secs: u64,
    },
    /// Broadcast when the cooldown elapses and the boss respawns
    BattleReset { status: BattleStatusData },
    /// An action was rejected or failed
    Error { code: ErrorCode, message: String },
    /// Heartbeat reply
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_round_trip() {
        let msg = ClientMessage::SubmitAnswer {
            event_boss_id: Uuid::new_v4(),
            question_id: Uuid::new_v4(),
            choice_index: 2,
            response_time_ms: Some(1_200),
        };
        let json = serde_json::to_string(&msg).expect("serializes");
        assert!(json.contains("\"type\":\"SubmitAnswer\""));
        let back: ClientMessage = serde_json::from_str(&json).expect("deserializes");
        assert!(matches!(back, ClientMessage::SubmitAnswer { choice_index: 2, .. }));
    }

    #[test]
    fn test_optional_fields_default() {
        let json = format!(
            "{{\"type\":\"JoinBossFight\",\"event_boss_id\":\"{}\",\"nickname\":\"Ada\"}}",
            Uuid::new_v4()
        );
        let msg: ClientMessage = serde_json::from_str(&json).expect("deserializes");
        match msg {
            ClientMessage::JoinBossFight { session_token, join_code, .. } => {
                assert!(session_token.is_none());
                assert!(join_code.is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_server_message_is_tagged() {
        let msg = ServerMessage::Pong;
        let json = serde_json::to_string(&msg).expect("serializes");
        assert_eq!(json, "{\"type\":\"Pong\"}");
    }
}
