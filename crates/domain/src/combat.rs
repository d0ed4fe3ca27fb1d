//! Combat resolution
//!
//! Turns a (correctness, speed tier) pair into a damage amount or a heart
//! loss. The functions here are pure; `BattleInstance` applies their results
//! to its owned state under the single-writer discipline.

use serde::{Deserialize, Serialize};

use crate::value_objects::{CombatPolicy, SpeedTier};

/// How a resolved answer affected the battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatOutcome {
    /// Damage applied to the boss
    Hit { damage: u32, defeated: bool },
    /// Correct, but the boss was already down in the serialized order.
    /// Counts as a correct answer, deals no damage; not an error.
    RaceLoss,
    /// Wrong or late; a heart was lost
    Miss { hearts_remaining: u32, knocked_out: bool },
}

/// Result of applying a correct answer's damage to the boss pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageApplication {
    pub damage: u32,
    pub hp_after: u32,
    /// True only for the resolution that observed HP > 0 and drove it to 0
    pub defeated: bool,
}

/// Compute and apply a correct answer against the current boss HP.
///
/// Damage is the policy's base scaled by the tier multiplier, floored at
/// zero HP. A call that finds the boss already at 0 applies no damage; the
/// caller reports it as a [`CombatOutcome::RaceLoss`].
pub fn apply_correct(policy: &CombatPolicy, tier: SpeedTier, hp_before: u32) -> DamageApplication {
    if hp_before == 0 {
        return DamageApplication {
            damage: 0,
            hp_after: 0,
            defeated: false,
        };
    }
    let raw = policy.damage_for(tier);
    let damage = raw.min(hp_before);
    let hp_after = hp_before - damage;
    DamageApplication {
        damage,
        hp_after,
        defeated: hp_after == 0,
    }
}

/// Result of a wrong or timed-out answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartLoss {
    pub hearts_remaining: u32,
    pub knocked_out: bool,
}

/// Decrement a heart, detecting knockout at zero.
pub fn apply_miss(hearts_before: u32) -> HeartLoss {
    let hearts_remaining = hearts_before.saturating_sub(1);
    HeartLoss {
        hearts_remaining,
        knocked_out: hearts_remaining == 0,
    }
}
