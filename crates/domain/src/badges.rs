//! Badge evaluation
//!
//! Milestone badges trigger the first time cumulative correct answers cross
//! a threshold, scoped to the event. Achievement badges are evaluated once
//! at battle-defeat time. Granting is idempotent at two levels: the
//! evaluators here never emit a threshold twice for the same crossing, and
//! the store's insert is keyed on (player, badge, scope).

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{EventBossId, EventId, PlayerId};
use crate::leaderboard::BattleSnapshot;

/// Correct-answer thresholds for milestone badges.
pub const MILESTONE_THRESHOLDS: [u64; 4] = [10, 25, 50, 100];

/// A badge kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeCode {
    /// Cumulative correct-answer milestones
    Correct10,
    Correct25,
    Correct50,
    Correct100,
    /// Highest individual damage in a battle
    Mvp,
    /// Dealt the defeating blow
    LastHit,
    /// Member of the team that brought the boss down
    BossDefeatedTeam,
    /// Defeated every boss in the event
    Hero,
}

impl BadgeCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correct10 => "correct-10",
            Self::Correct25 => "correct-25",
            Self::Correct50 => "correct-50",
            Self::Correct100 => "correct-100",
            Self::Mvp => "mvp",
            Self::LastHit => "last-hit",
            Self::BossDefeatedTeam => "boss-defeated",
            Self::Hero => "hero",
        }
    }

    fn for_threshold(threshold: u64) -> Option<Self> {
        match threshold {
            10 => Some(Self::Correct10),
            25 => Some(Self::Correct25),
            50 => Some(Self::Correct50),
            100 => Some(Self::Correct100),
            _ => None,
        }
    }
}

impl fmt::Display for BadgeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a grant is keyed against, alongside player and badge code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum BadgeScope {
    /// Achievement badges: one per event-boss
    EventBoss(EventBossId),
    /// Milestone and hero badges: one per event
    Event(EventId),
}

/// A badge awarded to a player. At most one grant exists per
/// (player, badge code, scope).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BadgeGrant {
    pub player_id: PlayerId,
    pub code: BadgeCode,
    pub scope: BadgeScope,
}

/// Milestone badges earned by moving cumulative correct answers from
/// `previous_total` to `new_total`. Each threshold is emitted only for the
/// merge that crosses it.
pub fn milestone_badges(
    player_id: PlayerId,
    event_id: EventId,
    previous_total: u64,
    new_total: u64,
) -> Vec<BadgeGrant> {
    MILESTONE_THRESHOLDS
        .iter()
        .filter(|&&t| previous_total < t && new_total >= t)
        .filter_map(|&t| BadgeCode::for_threshold(t))
        .map(|code| BadgeGrant {
            player_id,
            code,
            scope: BadgeScope::Event(event_id),
        })
        .collect()
}

/// Achievement badges for a single completed battle: MVP, last hit, and
/// every member of the winning team. Scoped to the event-boss.
pub fn achievement_badges(snapshot: &BattleSnapshot) -> Vec<BadgeGrant> {
    let scope = BadgeScope::EventBoss(snapshot.event_boss_id);
    let mut grants = Vec::new();

    if let Some(mvp) = snapshot.mvp() {
        grants.push(BadgeGrant {
            player_id: mvp,
            code: BadgeCode::Mvp,
            scope,
        });
    }
    grants.push(BadgeGrant {
        player_id: snapshot.last_hit,
        code: BadgeCode::LastHit,
        scope,
    });
    for player in snapshot
        .players
        .iter()
        .filter(|p| p.team_index == snapshot.winning_team)
    {
        grants.push(BadgeGrant {
            player_id: player.player_id,
            code: BadgeCode::BossDefeatedTeam,
            scope,
        });
    }
    grants
}

/// Hero badge: the player has now defeated every boss in the event.
/// `defeated` is the set of event-bosses whose winning team the player has
/// been on at least once, including this battle.
pub fn hero_badge(
    player_id: PlayerId,
    event_id: EventId,
    all_bosses: &[EventBossId],
    defeated: &HashSet<EventBossId>,
) -> Option<BadgeGrant> {
    if all_bosses.is_empty() || !all_bosses.iter().all(|b| defeated.contains(b)) {
        return None;
    }
    Some(BadgeGrant {
        player_id,
        code: BadgeCode::Hero,
        scope: BadgeScope::Event(event_id),
    })
}
