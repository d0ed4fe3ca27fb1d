//! Domain events emitted by a battle
//!
//! One event per state change, emitted only after the corresponding
//! mutation has applied to the instance. The engine maps these onto wire
//! broadcasts; the domain does not know about transports.

use chrono::{DateTime, Utc};

use crate::ids::PlayerId;
use crate::value_objects::RevivalCode;

/// A state change observable by battle participants.
#[derive(Debug, Clone, PartialEq)]
pub enum BattleEvent {
    /// A player was seated on a team
    PlayerJoined {
        player_id: PlayerId,
        nickname: String,
        team_index: u32,
        player_count: u32,
    },
    /// A player explicitly left the battle
    PlayerLeft {
        player_id: PlayerId,
        player_count: u32,
    },
    /// Combat began: the first question of the fight was issued
    BattleStarted { started_at: DateTime<Utc> },
    /// A correct answer landed on the boss
    BossDamaged {
        attacker: PlayerId,
        damage: u32,
        boss_hp: u32,
    },
    /// A wrong or late answer cost a heart
    HeartLost {
        player_id: PlayerId,
        hearts_remaining: u32,
        knocked_out: bool,
    },
    /// A player hit zero hearts; the code goes to the affected player only
    PlayerKnockedOut {
        player_id: PlayerId,
        revival_code: RevivalCode,
    },
    /// A teammate redeemed the code
    PlayerRevived {
        player_id: PlayerId,
        revived_by: PlayerId,
        hearts: u32,
    },
    /// Boss HP reached zero; the fight is over
    BossDefeated {
        winning_team: u32,
        last_hit: PlayerId,
        cooldown_ends_at: DateTime<Utc>,
    },
    /// Cooldown elapsed; the instance reset for a new fight cycle
    BattleReset { boss_hp: u32 },
}
