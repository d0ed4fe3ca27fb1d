//! Process-wide battle registry
//!
//! One live task per event-boss id. Lookups race through a `DashMap`; the
//! losing spawner of a creation race drops its task handle and uses the
//! winner's. Tasks that shut down leave a closed sender behind, which the
//! next lookup (or the periodic sweep) clears.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;

use quizraid_domain::{BattleError, BattleInstance, EventBossId, QuestionDeck};

use crate::error::EngineError;
use crate::infrastructure::ports::QuestionSource;

use super::commands::BattleCommand;
use super::runner::{self, RunnerDeps};

/// How often the background sweep drops dead entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct BattleRegistry {
    battles: DashMap<EventBossId, mpsc::Sender<BattleCommand>>,
    questions: Arc<dyn QuestionSource>,
    deps: RunnerDeps,
}

impl BattleRegistry {
    pub fn new(questions: Arc<dyn QuestionSource>, deps: RunnerDeps) -> Self {
        Self {
            battles: DashMap::new(),
            questions,
            deps,
        }
    }

    /// Hand back the command channel for a boss's live battle, spawning the
    /// task if none is running.
    pub async fn obtain(
        &self,
        event_boss_id: EventBossId,
    ) -> Result<mpsc::Sender<BattleCommand>, EngineError> {
        if let Some(handle) = self.battles.get(&event_boss_id) {
            if !handle.is_closed() {
                return Ok(handle.value().clone());
            }
        }

        // Fetch outside the map entry so slow collaborators never hold a shard
        let config = self
            .deps
            .directory
            .config(event_boss_id)
            .await?
            .ok_or_else(|| {
                BattleError::NotFound(format!("event-boss {event_boss_id} is not configured"))
            })?;
        let question_set = self
            .questions
            .questions_for_category(config.category_id)
            .await?;
        let deck = QuestionDeck::new(question_set)?;
        let battle = BattleInstance::new(config, deck)?;

        match self.battles.entry(event_boss_id) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().is_closed() {
                    tracing::debug!(battle_id = %event_boss_id, "Replacing dead battle task");
                    let tx = runner::spawn(battle, self.deps.clone());
                    occupied.insert(tx.clone());
                    Ok(tx)
                } else {
                    // Lost the creation race; the freshly built instance is
                    // dropped unused.
                    Ok(occupied.get().clone())
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                tracing::info!(battle_id = %event_boss_id, "Spawning battle task");
                let tx = runner::spawn(battle, self.deps.clone());
                vacant.insert(tx.clone());
                Ok(tx)
            }
        }
    }

    /// The live channel for a boss, if its task is still running.
    pub fn live(&self, event_boss_id: EventBossId) -> Option<mpsc::Sender<BattleCommand>> {
        self.battles
            .get(&event_boss_id)
            .filter(|handle| !handle.is_closed())
            .map(|handle| handle.value().clone())
    }

    /// Drop entries whose task has exited.
    pub fn sweep(&self) {
        self.battles.retain(|event_boss_id, handle| {
            let alive = !handle.is_closed();
            if !alive {
                tracing::debug!(battle_id = %event_boss_id, "Swept dead battle entry");
            }
            alive
        });
    }

    pub fn len(&self) -> usize {
        self.battles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.battles.is_empty()
    }
}

/// Periodically clear registry entries for battles that shut down.
pub fn spawn_sweeper(registry: Arc<BattleRegistry>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            registry.sweep();
        }
    });
}
