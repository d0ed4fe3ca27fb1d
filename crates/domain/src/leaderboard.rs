//! Cross-battle stat accumulation
//!
//! A completed battle is snapshotted once, on the cooldown transition, and
//! merged into persistent per-(player, event-boss) totals. All counters are
//! monotonically non-decreasing: a new battle only ever adds. Merges carry
//! the battle sequence number so a storage retry cannot double-count.

use serde::{Deserialize, Serialize};

use crate::aggregates::BattleInstance;
use crate::ids::{EventBossId, EventId, PlayerId};

/// One player's totals for a single completed battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerBattleStats {
    pub player_id: PlayerId,
    pub nickname: String,
    pub team_index: u32,
    pub damage_dealt: u64,
    pub correct_answers: u32,
    pub questions_answered: u32,
}

/// Everything the accumulator and badge evaluator need from a finished
/// battle. Taken exactly once per battle completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleSnapshot {
    pub event_id: EventId,
    pub event_boss_id: EventBossId,
    /// Identifies the fight cycle; merges keyed on it are idempotent
    pub battle_seq: u64,
    pub winning_team: u32,
    pub last_hit: PlayerId,
    pub players: Vec<PlayerBattleStats>,
}

impl BattleSnapshot {
    /// Snapshot a defeated battle. Returns `None` before defeat.
    pub fn take(battle: &BattleInstance) -> Option<Self> {
        let (winning_team, last_hit) = battle.defeat_outcome()?;
        let mut players: Vec<PlayerBattleStats> = battle
            .teams()
            .iter()
            .flat_map(|team| team.players())
            .map(|p| PlayerBattleStats {
                player_id: p.player_id(),
                nickname: p.nickname().as_str().to_string(),
                team_index: p.team_index(),
                damage_dealt: p.damage_dealt(),
                correct_answers: p.correct_answers(),
                questions_answered: p.questions_answered(),
            })
            .collect();
        // Deterministic order for MVP tie-breaking and stable broadcasts
        players.sort_by_key(|p| *p.player_id.as_uuid());
        Some(Self {
            event_id: battle.config().event_id,
            event_boss_id: battle.event_boss_id(),
            battle_seq: battle.battle_seq(),
            winning_team,
            last_hit,
            players,
        })
    }

    /// The player with the highest individual damage this battle, ties
    /// broken by player id for determinism.
    pub fn mvp(&self) -> Option<PlayerId> {
        self.players
            .iter()
            .max_by(|a, b| {
                a.damage_dealt
                    .cmp(&b.damage_dealt)
                    .then_with(|| b.player_id.as_uuid().cmp(a.player_id.as_uuid()))
            })
            .map(|p| p.player_id)
    }
}

/// Persistent cumulative totals keyed by (player, event-boss).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub player_id: PlayerId,
    pub event_boss_id: EventBossId,
    pub total_damage: u64,
    pub total_correct: u64,
    pub total_answered: u64,
    pub battles_participated: u64,
}

impl LeaderboardEntry {
    /// Fresh entry with zeroed totals.
    pub fn new(player_id: PlayerId, event_boss_id: EventBossId) -> Self {
        Self {
            player_id,
            event_boss_id,
            total_damage: 0,
            total_correct: 0,
            total_answered: 0,
            battles_participated: 0,
        }
    }

    /// Fold one completed battle into the totals. Battles participated
    /// rises by exactly 1 per call, never per question; the caller invokes
    /// this once per battle completion.
    pub fn merge_battle(&mut self, stats: &PlayerBattleStats) {
        self.total_damage += stats.damage_dealt;
        self.total_correct += stats.correct_answers as u64;
        self.total_answered += stats.questions_answered as u64;
        self.battles_participated += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(player_id: PlayerId, damage: u64, correct: u32, answered: u32) -> PlayerBattleStats {
        PlayerBattleStats {
            player_id,
            nickname: "Ada".to_string(),
            team_index: 0,
            damage_dealt: damage,
            correct_answers: correct,
            questions_answered: answered,
        }
    }

    #[test]
    fn test_merge_accumulates_without_reset() {
        let player = PlayerId::new();
        let boss = EventBossId::new();
        let mut entry = LeaderboardEntry::new(player, boss);
        entry.merge_battle(&stats(player, 120, 8, 10));
        entry.merge_battle(&stats(player, 75, 5, 6));
        assert_eq!(entry.total_damage, 195);
        assert_eq!(entry.total_correct, 13);
        assert_eq!(entry.total_answered, 16);
        assert_eq!(entry.battles_participated, 2);
    }

    #[test]
    fn test_merge_is_associative_across_battles() {
        let player = PlayerId::new();
        let boss = EventBossId::new();
        let a = stats(player, 120, 8, 10);
        let b = stats(player, 75, 5, 6);

        let mut sequential = LeaderboardEntry::new(player, boss);
        sequential.merge_battle(&a);
        sequential.merge_battle(&b);

        let mut combined = LeaderboardEntry::new(player, boss);
        combined.merge_battle(&stats(
            player,
            a.damage_dealt + b.damage_dealt,
            a.correct_answers + b.correct_answers,
            a.questions_answered + b.questions_answered,
        ));
        // One combined battle differs only in the participation counter
        combined.battles_participated += 1;

        assert_eq!(sequential.total_damage, combined.total_damage);
        assert_eq!(sequential.total_correct, combined.total_correct);
        assert_eq!(sequential.total_answered, combined.total_answered);
        assert_eq!(sequential.battles_participated, combined.battles_participated);
    }

    #[test]
    fn test_mvp_is_highest_damage() {
        let low = PlayerId::new();
        let high = PlayerId::new();
        let snapshot = BattleSnapshot {
            event_id: EventId::new(),
            event_boss_id: EventBossId::new(),
            battle_seq: 1,
            winning_team: 0,
            last_hit: high,
            players: vec![stats(low, 40, 2, 3), stats(high, 90, 4, 4)],
        };
        assert_eq!(snapshot.mvp(), Some(high));
    }
}
