//! Per-fight configuration read from the storage layer
//!
//! `EventBossConfig` is immutable for the battle core once a fight starts;
//! the engine resolves it through a directory port at join time.

use serde::{Deserialize, Serialize};

use crate::ids::{CategoryId, EventBossId, EventId};
use crate::value_objects::SpeedTier;

/// Tunable combat constants.
///
/// The exact multiplier values are policy, not contract: defaults reproduce
/// the canonical scenarios (fast 40 / medium 25 / slow 10 damage off a base
/// of 20) but a deployment may override them per event-boss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatPolicy {
    /// Base damage for a correct answer before the speed multiplier
    pub base_damage: u32,
    /// Damage multiplier for fast answers
    pub fast_multiplier: f64,
    /// Damage multiplier for medium answers
    pub medium_multiplier: f64,
    /// Damage multiplier for slow answers
    pub slow_multiplier: f64,
    /// Upper edge of the fast band, as a fraction of the time limit
    pub fast_band: f64,
    /// Upper edge of the medium band, as a fraction of the time limit
    pub medium_band: f64,
    /// Hearts a player starts the fight with
    pub starting_hearts: u32,
    /// Hearts restored by a successful revival (less than starting)
    pub revival_hearts: u32,
}

impl Default for CombatPolicy {
    fn default() -> Self {
        Self {
            base_damage: 20,
            fast_multiplier: 2.0,
            medium_multiplier: 1.25,
            slow_multiplier: 0.5,
            fast_band: 1.0 / 3.0,
            medium_band: 2.0 / 3.0,
            starting_hearts: 3,
            revival_hearts: 1,
        }
    }
}

impl CombatPolicy {
    /// Damage dealt by a correct answer at the given speed tier.
    pub fn damage_for(&self, tier: SpeedTier) -> u32 {
        let multiplier = match tier {
            SpeedTier::Fast => self.fast_multiplier,
            SpeedTier::Medium => self.medium_multiplier,
            SpeedTier::Slow => self.slow_multiplier,
        };
        (self.base_damage as f64 * multiplier).round() as u32
    }
}

/// One configured boss fight tied to an event.
///
/// Owned by the excluded storage layer; the core reads it once per battle
/// and treats it as frozen for the fight's duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBossConfig {
    pub event_id: EventId,
    pub event_boss_id: EventBossId,
    pub boss_name: String,
    pub max_hp: u32,
    /// How long the boss stays down before the next fight cycle, in seconds
    pub cooldown_secs: u64,
    pub number_of_teams: u32,
    /// Per-team player cap; `None` means unbounded
    pub max_players_per_team: Option<u32>,
    /// Join code players must present when the fight requires one
    pub join_code: Option<String>,
    pub category_id: CategoryId,
    pub policy: CombatPolicy,
}

impl EventBossConfig {
    /// Validate invariants the rest of the core relies on.
    pub fn validate(&self) -> Result<(), crate::error::BattleError> {
        if self.max_hp == 0 {
            return Err(crate::error::BattleError::validation("boss max HP must be positive"));
        }
        if self.number_of_teams == 0 {
            return Err(crate::error::BattleError::validation("number of teams must be positive"));
        }
        if self.policy.revival_hearts >= self.policy.starting_hearts {
            return Err(crate::error::BattleError::validation(
                "revival hearts must be less than starting hearts",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_damage_table() {
        let policy = CombatPolicy::default();
        assert_eq!(policy.damage_for(SpeedTier::Fast), 40);
        assert_eq!(policy.damage_for(SpeedTier::Medium), 25);
        assert_eq!(policy.damage_for(SpeedTier::Slow), 10);
    }

    #[test]
    fn test_multipliers_strictly_decrease() {
        let policy = CombatPolicy::default();
        assert!(policy.damage_for(SpeedTier::Fast) > policy.damage_for(SpeedTier::Medium));
        assert!(policy.damage_for(SpeedTier::Medium) > policy.damage_for(SpeedTier::Slow));
    }

    #[test]
    fn test_config_validation() {
        let config = EventBossConfig {
            event_id: EventId::new(),
            event_boss_id: EventBossId::new(),
            boss_name: "Void Wyrm".to_string(),
            max_hp: 0,
            cooldown_secs: 30,
            number_of_teams: 2,
            max_players_per_team: None,
            join_code: None,
            category_id: CategoryId::new(),
            policy: CombatPolicy::default(),
        };
        assert!(config.validate().is_err());
    }
}
