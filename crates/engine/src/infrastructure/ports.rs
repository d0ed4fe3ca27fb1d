//! Collaborator ports
//!
//! The battle core talks to the excluded storage layer through these narrow
//! interfaces: read a question set, resolve an identity, persist accumulated
//! stats and badge grants. Implementations are injected as `Arc<dyn Port>`.

use std::collections::HashSet;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use quizraid_domain::{
    BadgeGrant, BattleSnapshot, CategoryId, EventBossConfig, EventBossId, EventId,
    LeaderboardEntry, PlayerId, Question,
};

/// Collaborator failures. Retryable: the in-memory battle state is never
/// rolled back on one of these; the caller retries the operation instead.
#[derive(Debug, Error, Clone)]
pub enum PortError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Question-source lookup by category. The stream never exhausts: the core
/// reshuffles the returned set when it runs out.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn questions_for_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<Question>, PortError>;
}

/// Read access to configured event-bosses.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventBossDirectory: Send + Sync {
    async fn config(&self, id: EventBossId) -> Result<Option<EventBossConfig>, PortError>;

    /// Every boss configured for an event; drives the hero badge.
    async fn bosses_in_event(&self, event_id: EventId) -> Result<Vec<EventBossId>, PortError>;
}

/// One player's entry after a merge, with the total it replaced.
#[derive(Debug, Clone)]
pub struct MergedEntry {
    pub previous_total_correct: u64,
    pub entry: LeaderboardEntry,
}

/// Durable read/upsert for cumulative per-(player, event-boss) totals.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    /// Merge a completed battle into cumulative totals.
    ///
    /// Idempotent per (event-boss, battle seq): replaying a snapshot the
    /// store has already applied changes nothing and reports unchanged
    /// totals, so retrying a failed settlement is safe.
    async fn merge_battle(&self, snapshot: &BattleSnapshot) -> Result<Vec<MergedEntry>, PortError>;

    async fn entry(
        &self,
        player_id: PlayerId,
        event_boss_id: EventBossId,
    ) -> Result<Option<LeaderboardEntry>, PortError>;

    /// Record that a player was on the winning team against a boss.
    async fn record_boss_defeat(
        &self,
        player_id: PlayerId,
        event_id: EventId,
        event_boss_id: EventBossId,
    ) -> Result<(), PortError>;

    /// Event-bosses this player has helped defeat within an event.
    async fn defeated_bosses(
        &self,
        player_id: PlayerId,
        event_id: EventId,
    ) -> Result<HashSet<EventBossId>, PortError>;
}

/// Durable idempotent insert for badge grants.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BadgeStore: Send + Sync {
    /// Insert the grant if no (player, badge, scope) row exists.
    /// Returns true when the grant is new.
    async fn insert_if_absent(&self, grant: &BadgeGrant) -> Result<bool, PortError>;

    async fn grants_for_player(&self, player_id: PlayerId) -> Result<Vec<BadgeGrant>, PortError>;
}

/// A connecting session mapped to a stable player id.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedIdentity {
    pub player_id: PlayerId,
    /// True when no authenticated session backed the connection
    pub guest: bool,
}

/// Maps a connecting session to a stable player id, authenticated or guest.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, session_token: Option<String>) -> Result<ResolvedIdentity, PortError>;
}
