//! The per-battle task
//!
//! One `BattleRunner` task exclusively owns one `BattleInstance` and drains
//! its command channel, so all HP-affecting resolutions apply in a single
//! consistent order and the defeat transition fires exactly once. Question
//! deadlines and cooldown expiry arrive as scheduled messages on the same
//! channel instead of blocking waits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::Utc;
use rand::Rng;
use tokio::sync::mpsc;

use quizraid_domain::{
    badges, AnswerResolution, BattleEvent, BattleInstance, BattlePhase, BattleSnapshot,
    CombatOutcome,
};
use quizraid_shared::{QuestionData, ServerMessage};

use crate::api::ConnectionManager;
use crate::infrastructure::ports::{BadgeStore, EventBossDirectory, LeaderboardStore, PortError};

use super::commands::{AnswerReply, BattleCommand, JoinReply, QuestionReply, RevivalReply};
use super::status::battle_status;

/// Buffer size for a battle's command channel.
const COMMAND_CHANNEL_BUFFER: usize = 256;

/// How long a settlement retry backs off at most.
const SETTLE_BACKOFF_CAP: StdDuration = StdDuration::from_secs(5);

/// Re-check interval when the cooldown elapses before settlement finished.
const SETTLE_WAIT: StdDuration = StdDuration::from_millis(500);

/// Everything a battle task needs besides the instance itself.
#[derive(Clone)]
pub struct RunnerDeps {
    pub connections: Arc<ConnectionManager>,
    pub leaderboard: Arc<dyn LeaderboardStore>,
    pub badges: Arc<dyn BadgeStore>,
    pub directory: Arc<dyn EventBossDirectory>,
    /// How long an empty `Pending` battle survives before the task exits
    pub idle_grace: StdDuration,
}

/// Spawn the task for a battle and hand back its command channel.
pub fn spawn(battle: BattleInstance, deps: RunnerDeps) -> mpsc::Sender<BattleCommand> {
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_BUFFER);
    let runner = BattleRunner {
        battle,
        self_tx: tx.clone(),
        deps,
        settled: Arc::new(AtomicBool::new(true)),
        idle_since: Some(Instant::now()),
    };
    tokio::spawn(runner.run(rx));
    tx
}

struct BattleRunner {
    battle: BattleInstance,
    self_tx: mpsc::Sender<BattleCommand>,
    deps: RunnerDeps,
    /// False between a defeat and the completion of its settlement
    settled: Arc<AtomicBool>,
    idle_since: Option<Instant>,
}

fn draw(bound: usize) -> usize {
    rand::thread_rng().gen_range(0..bound.max(1))
}

impl BattleRunner {
    async fn run(mut self, mut rx: mpsc::Receiver<BattleCommand>) {
        let event_boss_id = self.battle.event_boss_id();
        tracing::info!(battle_id = %event_boss_id, "Battle task started");
        self.schedule(BattleCommand::IdleCheck, self.deps.idle_grace);

        while let Some(command) = rx.recv().await {
            if self.handle(command).await {
                break;
            }
        }
        tracing::info!(battle_id = %event_boss_id, "Battle task stopped");
    }

    /// Returns true when the task should exit.
    async fn handle(&mut self, command: BattleCommand) -> bool {
        match command {
            BattleCommand::Join { player_id, nickname, reply } => {
                let result = self.battle.join(player_id, nickname);
                match result {
                    Ok(outcome) => {
                        self.idle_since = None;
                        self.publish(&outcome.events).await;
                        let _ = reply.send(Ok(JoinReply {
                            player_id,
                            team_index: outcome.team_index,
                            status: battle_status(&self.battle, Utc::now()),
                        }));
                    }
                    Err(err) => {
                        tracing::warn!(battle_id = %self.battle.event_boss_id(), player_id = %player_id, error = %err, "Join rejected");
                        let _ = reply.send(Err(err));
                    }
                }
            }
            BattleCommand::Preview { reply } => {
                let _ = reply.send(battle_status(&self.battle, Utc::now()));
            }
            BattleCommand::IssueQuestion { player_id, reply } => {
                let now = Utc::now();
                match self.battle.issue_question(player_id, now, draw) {
                    Ok(issued) => {
                        self.publish(&issued.events).await;
                        let wait = (issued.deadline - now)
                            .to_std()
                            .unwrap_or(StdDuration::ZERO);
                        self.schedule(
                            BattleCommand::DeadlineElapsed {
                                player_id,
                                generation: issued.generation,
                            },
                            wait,
                        );
                        let _ = reply.send(Ok(QuestionReply {
                            question: QuestionData {
                                id: issued.question.id.to_uuid(),
                                text: issued.question.text,
                                choices: issued.question.choices,
                                time_limit_ms: issued.question.time_limit_ms,
                            },
                            deadline_ms: issued.deadline.timestamp_millis(),
                        }));
                    }
                    Err(err) => {
                        tracing::debug!(battle_id = %self.battle.event_boss_id(), player_id = %player_id, error = %err, "Question issue rejected");
                        let _ = reply.send(Err(err));
                    }
                }
            }
            BattleCommand::SubmitAnswer {
                player_id,
                question_id,
                choice_index,
                client_reported_ms,
                reply,
            } => {
                let result = self.battle.submit_answer(
                    player_id,
                    question_id,
                    choice_index,
                    client_reported_ms,
                    Utc::now(),
                    draw,
                );
                match result {
                    Ok(resolution) => {
                        self.after_resolution(&resolution).await;
                        let damage = match resolution.outcome {
                            CombatOutcome::Hit { damage, .. } => damage,
                            _ => 0,
                        };
                        let _ = reply.send(Ok(AnswerReply {
                            correct: resolution.correct,
                            damage,
                            response_category: resolution.tier,
                            outcome: resolution.outcome,
                            status: battle_status(&self.battle, Utc::now()),
                        }));
                    }
                    Err(err) => {
                        tracing::debug!(battle_id = %self.battle.event_boss_id(), player_id = %player_id, error = %err, "Answer rejected");
                        let _ = reply.send(Err(err));
                    }
                }
            }
            BattleCommand::RedeemRevival { player_id, code, reply } => {
                match self.battle.redeem_revival(player_id, &code) {
                    Ok(resolution) => {
                        self.publish(&resolution.events).await;
                        let _ = reply.send(Ok(RevivalReply {
                            target: resolution.target,
                            hearts: resolution.hearts,
                        }));
                    }
                    Err(err) => {
                        tracing::debug!(battle_id = %self.battle.event_boss_id(), player_id = %player_id, error = %err, "Revival rejected");
                        let _ = reply.send(Err(err));
                    }
                }
            }
            BattleCommand::Leave { player_id, reply } => {
                match self.battle.leave(player_id) {
                    Ok(events) => {
                        self.publish(&events).await;
                        self.arm_idle_if_empty();
                        let _ = reply.send(Ok(()));
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    }
                }
            }
            BattleCommand::Disconnected { player_id } => {
                self.battle.disconnect(player_id);
            }
            BattleCommand::DeadlineElapsed { player_id, generation } => {
                match self
                    .battle
                    .deadline_elapsed(player_id, generation, Utc::now(), draw)
                {
                    Ok(Some(resolution)) => {
                        tracing::debug!(
                            battle_id = %self.battle.event_boss_id(),
                            player_id = %player_id,
                            "Answer deadline missed"
                        );
                        self.after_resolution(&resolution).await;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(battle_id = %self.battle.event_boss_id(), error = %err, "Deadline handling failed");
                    }
                }
            }
            BattleCommand::Settle => {
                self.settle();
            }
            BattleCommand::CooldownElapsed { battle_seq } => {
                if self.battle.battle_seq() != battle_seq
                    || self.battle.phase() != BattlePhase::Cooldown
                {
                    return false;
                }
                if !self.settled.load(Ordering::Acquire) {
                    // Accumulation has not landed yet; the reset waits
                    self.schedule(BattleCommand::CooldownElapsed { battle_seq }, SETTLE_WAIT);
                    return false;
                }
                match self.battle.reset_for_next_cycle() {
                    Ok(events) => {
                        tracing::info!(
                            battle_id = %self.battle.event_boss_id(),
                            battle_seq = self.battle.battle_seq(),
                            "Battle reset for next fight cycle"
                        );
                        self.publish(&events).await;
                        self.arm_idle_if_empty();
                    }
                    Err(err) => {
                        tracing::warn!(battle_id = %self.battle.event_boss_id(), error = %err, "Reset failed");
                    }
                }
            }
            BattleCommand::IdleCheck => {
                if self.battle.phase() == BattlePhase::Pending && self.battle.player_count() == 0 {
                    match self.idle_since {
                        Some(since) if since.elapsed() >= self.deps.idle_grace => {
                            tracing::info!(
                                battle_id = %self.battle.event_boss_id(),
                                "Battle idle past grace period, shutting down"
                            );
                            return true;
                        }
                        Some(since) => {
                            let remaining = self.deps.idle_grace.saturating_sub(since.elapsed());
                            self.schedule(BattleCommand::IdleCheck, remaining);
                        }
                        None => self.arm_idle_if_empty(),
                    }
                } else {
                    self.idle_since = None;
                }
            }
        }
        false
    }

    /// Broadcast a resolution's events and, on a defeat, kick off the
    /// settlement and cooldown machinery.
    async fn after_resolution(&mut self, resolution: &AnswerResolution) {
        self.publish(&resolution.events).await;

        let defeated = resolution
            .events
            .iter()
            .any(|e| matches!(e, BattleEvent::BossDefeated { .. }));
        if defeated {
            self.settled.store(false, Ordering::Release);
            // Settle after already-queued commands drain, so answers racing
            // the defeat still land in this battle's totals.
            self.schedule(BattleCommand::Settle, StdDuration::ZERO);
            let cooldown = StdDuration::from_secs(self.battle.config().cooldown_secs);
            self.schedule(
                BattleCommand::CooldownElapsed {
                    battle_seq: self.battle.battle_seq(),
                },
                cooldown,
            );
        }
    }

    /// Snapshot the finished battle and persist it off-task.
    fn settle(&mut self) {
        let Some(snapshot) = BattleSnapshot::take(&self.battle) else {
            tracing::warn!(battle_id = %self.battle.event_boss_id(), "Settle without a defeat");
            return;
        };
        let leaderboard = self.deps.leaderboard.clone();
        let badges = self.deps.badges.clone();
        let directory = self.deps.directory.clone();
        let settled = self.settled.clone();
        tokio::spawn(async move {
            let mut backoff = StdDuration::from_millis(250);
            loop {
                match settle_once(&snapshot, &leaderboard, &badges, &directory).await {
                    Ok(()) => break,
                    Err(err) => {
                        // The battle transition is not rolled back; the
                        // idempotent merge makes this retry safe.
                        tracing::warn!(
                            battle_id = %snapshot.event_boss_id,
                            battle_seq = snapshot.battle_seq,
                            error = %err,
                            "Settlement failed, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(SETTLE_BACKOFF_CAP);
                    }
                }
            }
            settled.store(true, Ordering::Release);
            tracing::info!(
                battle_id = %snapshot.event_boss_id,
                battle_seq = snapshot.battle_seq,
                "Battle settled"
            );
        });
    }

    fn arm_idle_if_empty(&mut self) {
        if self.battle.player_count() == 0 && self.battle.phase() == BattlePhase::Pending {
            self.idle_since = Some(Instant::now());
            self.schedule(BattleCommand::IdleCheck, self.deps.idle_grace);
        }
    }

    /// Deliver a command to our own channel after a delay.
    fn schedule(&self, command: BattleCommand, after: StdDuration) {
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            if !after.is_zero() {
                tokio::time::sleep(after).await;
            }
            let _ = tx.send(command).await;
        });
    }

    /// Map domain events onto wire broadcasts, one message per state change.
    async fn publish(&self, events: &[BattleEvent]) {
        let event_boss_id = self.battle.event_boss_id();
        let wire_id = event_boss_id.to_uuid();
        for event in events {
            match event {
                BattleEvent::PlayerJoined { player_count, .. }
                | BattleEvent::PlayerLeft { player_count, .. } => {
                    self.deps
                        .connections
                        .broadcast_to_battle(
                            event_boss_id,
                            ServerMessage::PlayerCountUpdated {
                                event_boss_id: wire_id,
                                player_count: *player_count,
                            },
                        )
                        .await;
                }
                BattleEvent::BattleStarted { started_at } => {
                    self.deps
                        .connections
                        .broadcast_to_battle(
                            event_boss_id,
                            ServerMessage::BattleStarted {
                                event_boss_id: wire_id,
                                started_at_ms: started_at.timestamp_millis(),
                            },
                        )
                        .await;
                }
                BattleEvent::BossDamaged { attacker, damage, boss_hp } => {
                    let nickname = self
                        .battle
                        .player(*attacker)
                        .map(|p| p.nickname().as_str().to_string())
                        .unwrap_or_default();
                    self.deps
                        .connections
                        .broadcast_to_battle(
                            event_boss_id,
                            ServerMessage::PlayerAttacked {
                                event_boss_id: wire_id,
                                attacker_id: attacker.to_uuid(),
                                attacker_nickname: nickname,
                                damage: *damage,
                                boss_hp: *boss_hp,
                            },
                        )
                        .await;
                }
                BattleEvent::HeartLost { player_id, hearts_remaining, knocked_out } => {
                    self.deps
                        .connections
                        .broadcast_to_battle(
                            event_boss_id,
                            ServerMessage::PlayerLostHeart {
                                event_boss_id: wire_id,
                                player_id: player_id.to_uuid(),
                                hearts_remaining: *hearts_remaining,
                                knocked_out: *knocked_out,
                            },
                        )
                        .await;
                }
                BattleEvent::PlayerKnockedOut { player_id, revival_code } => {
                    // The code goes to the affected player only
                    self.deps
                        .connections
                        .send_to_player(
                            event_boss_id,
                            *player_id,
                            ServerMessage::PlayerKnockedOut {
                                revival_code: revival_code.as_str().to_string(),
                            },
                        )
                        .await;
                    if let Some(player) = self.battle.player(*player_id) {
                        self.deps
                            .connections
                            .broadcast_to_team(
                                event_boss_id,
                                player.team_index(),
                                ServerMessage::TeammateKnockedOut {
                                    event_boss_id: wire_id,
                                    player_id: player_id.to_uuid(),
                                    nickname: player.nickname().as_str().to_string(),
                                },
                            )
                            .await;
                    }
                }
                BattleEvent::PlayerRevived { player_id, revived_by, hearts } => {
                    self.deps
                        .connections
                        .broadcast_to_battle(
                            event_boss_id,
                            ServerMessage::PlayerRevived {
                                event_boss_id: wire_id,
                                player_id: player_id.to_uuid(),
                                revived_by: revived_by.to_uuid(),
                                hearts: *hearts,
                            },
                        )
                        .await;
                }
                BattleEvent::BossDefeated { winning_team, last_hit, cooldown_ends_at } => {
                    let next_battle_in_secs =
                        (*cooldown_ends_at - Utc::now()).num_seconds().max(0) as u64;
                    self.deps
                        .connections
                        .broadcast_to_battle(
                            event_boss_id,
                            ServerMessage::BossDefeated {
                                event_boss_id: wire_id,
                                winning_team: *winning_team,
                                last_hit: last_hit.to_uuid(),
                                next_battle_in_secs,
                            },
                        )
                        .await;
                }
                BattleEvent::BattleReset { .. } => {
                    self.deps
                        .connections
                        .broadcast_to_battle(
                            event_boss_id,
                            ServerMessage::BattleReset {
                                status: battle_status(&self.battle, Utc::now()),
                            },
                        )
                        .await;
                }
            }
        }
    }
}

/// One settlement attempt: leaderboard merge, defeat records, badges.
/// Every step is idempotent, so the caller may retry the whole thing.
async fn settle_once(
    snapshot: &BattleSnapshot,
    leaderboard: &Arc<dyn LeaderboardStore>,
    badge_store: &Arc<dyn BadgeStore>,
    directory: &Arc<dyn EventBossDirectory>,
) -> Result<(), PortError> {
    let merged = leaderboard.merge_battle(snapshot).await?;

    let winners: Vec<_> = snapshot
        .players
        .iter()
        .filter(|p| p.team_index == snapshot.winning_team)
        .map(|p| p.player_id)
        .collect();
    for player_id in &winners {
        leaderboard
            .record_boss_defeat(*player_id, snapshot.event_id, snapshot.event_boss_id)
            .await?;
    }

    for grant in badges::achievement_badges(snapshot) {
        badge_store.insert_if_absent(&grant).await?;
    }

    for entry in &merged {
        let grants = badges::milestone_badges(
            entry.entry.player_id,
            snapshot.event_id,
            entry.previous_total_correct,
            entry.entry.total_correct,
        );
        for grant in grants {
            badge_store.insert_if_absent(&grant).await?;
        }
    }

    let all_bosses = directory.bosses_in_event(snapshot.event_id).await?;
    for player_id in &winners {
        let defeated = leaderboard
            .defeated_bosses(*player_id, snapshot.event_id)
            .await?;
        if let Some(grant) = badges::hero_badge(*player_id, snapshot.event_id, &all_bosses, &defeated)
        {
            badge_store.insert_if_absent(&grant).await?;
        }
    }
    Ok(())
}
