//! Application state and composition.

use std::sync::Arc;
use std::time::Duration;

use crate::api::ConnectionManager;
use crate::battle::registry::BattleRegistry;
use crate::battle::runner::RunnerDeps;
use crate::infrastructure::ports::{
    BadgeStore, EventBossDirectory, IdentityResolver, LeaderboardStore, QuestionSource,
};

/// How long an empty, never-started battle task lives before exiting.
const DEFAULT_IDLE_GRACE: Duration = Duration::from_secs(300);

/// Main application state.
///
/// Holds the battle registry and every injected collaborator. Passed to
/// WebSocket handlers via Axum state.
pub struct App {
    pub registry: Arc<BattleRegistry>,
    pub directory: Arc<dyn EventBossDirectory>,
    pub leaderboard: Arc<dyn LeaderboardStore>,
    pub badges: Arc<dyn BadgeStore>,
    pub identity: Arc<dyn IdentityResolver>,
}

impl App {
    /// Create a new App with all dependencies wired up.
    pub fn new(
        questions: Arc<dyn QuestionSource>,
        directory: Arc<dyn EventBossDirectory>,
        leaderboard: Arc<dyn LeaderboardStore>,
        badges: Arc<dyn BadgeStore>,
        identity: Arc<dyn IdentityResolver>,
        connections: Arc<ConnectionManager>,
    ) -> Self {
        let deps = RunnerDeps {
            connections,
            leaderboard: leaderboard.clone(),
            badges: badges.clone(),
            directory: directory.clone(),
            idle_grace: DEFAULT_IDLE_GRACE,
        };
        let registry = Arc::new(BattleRegistry::new(questions, deps));

        Self {
            registry,
            directory,
            leaderboard,
            badges,
            identity,
        }
    }
}
