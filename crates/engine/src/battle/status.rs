//! Battle status DTO assembly

use chrono::{DateTime, Utc};

use quizraid_domain::BattleInstance;
use quizraid_shared::{BattleStatusData, PhaseData, PlayerStatusData, TeamStatusData};

/// Build the wire snapshot of a battle as of `now`.
pub fn battle_status(battle: &BattleInstance, now: DateTime<Utc>) -> BattleStatusData {
    let next_battle_in_secs = battle
        .cooldown_ends_at()
        .map(|ends| (ends - now).num_seconds().max(0) as u64);

    let mut players: Vec<PlayerStatusData> = battle
        .teams()
        .iter()
        .flat_map(|team| team.players())
        .map(|p| PlayerStatusData {
            player_id: p.player_id().to_uuid(),
            nickname: p.nickname().as_str().to_string(),
            team_index: p.team_index(),
            hearts: p.hearts(),
            knocked_out: p.is_knocked_out(),
            connected: p.is_connected(),
        })
        .collect();
    players.sort_by_key(|p| p.player_id);

    BattleStatusData {
        event_boss_id: battle.event_boss_id().to_uuid(),
        boss_name: battle.config().boss_name.clone(),
        phase: PhaseData::from(battle.phase()),
        boss_hp: battle.boss_hp(),
        boss_max_hp: battle.config().max_hp,
        player_count: battle.player_count(),
        teams: battle
            .teams()
            .iter()
            .map(|team| TeamStatusData {
                index: team.index(),
                player_count: team.len() as u32,
                total_damage: team.total_damage(),
            })
            .collect(),
        players,
        next_battle_in_secs,
    }
}
