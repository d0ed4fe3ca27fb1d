//! BattleInstance aggregate - the live fight for one event-boss pairing
//!
//! # Ownership
//!
//! A `BattleInstance` exclusively owns its `Team`s and their
//! `PlayerCombatState`s for its lifetime; the engine gives each instance to
//! exactly one task, so every method here runs under a single writer and
//! HP-affecting resolutions apply in one consistent order.
//!
//! # Lifecycle
//!
//! `Pending` (no players) → `Active` (players seated, combat not begun) →
//! `InBattle` (first question issued) → `Cooldown` (boss down) → back to
//! `Pending`/`Active` when the cooldown elapses. Actions arriving in a phase
//! that does not accept them fail with `BattleError::StaleBattle` and leave
//! state untouched.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::balancer;
use crate::combat::{self, CombatOutcome};
use crate::entities::{Question, QuestionDeck};
use crate::error::BattleError;
use crate::events::BattleEvent;
use crate::ids::{EventBossId, PlayerId, QuestionId};
use crate::value_objects::{EventBossConfig, Nickname, RevivalCode, SpeedTier};

/// Lifecycle phase of a battle instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattlePhase {
    /// No players yet, or waiting after a reset
    Pending,
    /// Players present, fight not yet begun
    Active,
    /// Boss HP being reduced
    InBattle,
    /// Boss defeated, timer running
    Cooldown,
}

/// The single unanswered question a player may hold.
#[derive(Debug, Clone)]
pub struct OutstandingQuestion {
    question_id: QuestionId,
    correct_choice: u32,
    time_limit_ms: u64,
    issued_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
    /// Tags the deadline timer so a stale timer is ignored
    generation: u64,
}

impl OutstandingQuestion {
    pub fn question_id(&self) -> QuestionId {
        self.question_id
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// One player's combat state within a battle.
#[derive(Debug, Clone)]
pub struct PlayerCombatState {
    player_id: PlayerId,
    nickname: Nickname,
    team_index: u32,
    hearts: u32,
    knocked_out: bool,
    /// Present from the first knockout on; kept after redemption so a
    /// second redeem reports `AlreadyRevived` instead of `InvalidCode`
    revival_code: Option<RevivalCode>,
    outstanding: Option<OutstandingQuestion>,
    connected: bool,
    damage_dealt: u64,
    correct_answers: u32,
    questions_answered: u32,
}

impl PlayerCombatState {
    fn new(player_id: PlayerId, nickname: Nickname, team_index: u32, hearts: u32) -> Self {
        Self {
            player_id,
            nickname,
            team_index,
            hearts,
            knocked_out: false,
            revival_code: None,
            outstanding: None,
            connected: true,
            damage_dealt: 0,
            correct_answers: 0,
            questions_answered: 0,
        }
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn nickname(&self) -> &Nickname {
        &self.nickname
    }

    pub fn team_index(&self) -> u32 {
        self.team_index
    }

    pub fn hearts(&self) -> u32 {
        self.hearts
    }

    pub fn is_knocked_out(&self) -> bool {
        self.knocked_out
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn outstanding(&self) -> Option<&OutstandingQuestion> {
        self.outstanding.as_ref()
    }

    pub fn damage_dealt(&self) -> u64 {
        self.damage_dealt
    }

    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    pub fn questions_answered(&self) -> u32 {
        self.questions_answered
    }
}

/// A team within a battle.
#[derive(Debug, Clone)]
pub struct Team {
    index: u32,
    players: HashMap<PlayerId, PlayerCombatState>,
    total_damage: u64,
}

impl Team {
    fn new(index: u32) -> Self {
        Self {
            index,
            players: HashMap::new(),
            total_damage: 0,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn total_damage(&self) -> u64 {
        self.total_damage
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerCombatState> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

/// Result of seating a player.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub team_index: u32,
    /// True when the player was already seated and only reconnected
    pub rejoined: bool,
    pub events: Vec<BattleEvent>,
}

/// Result of issuing a question to a player.
#[derive(Debug, Clone)]
pub struct IssuedQuestion {
    pub question: Question,
    pub deadline: DateTime<Utc>,
    pub generation: u64,
    /// Contains `BattleStarted` when this issue began the fight
    pub events: Vec<BattleEvent>,
}

/// Result of resolving an answer (submitted or deadline-missed).
#[derive(Debug, Clone)]
pub struct AnswerResolution {
    pub player_id: PlayerId,
    pub question_id: QuestionId,
    pub correct: bool,
    pub tier: SpeedTier,
    pub outcome: CombatOutcome,
    pub events: Vec<BattleEvent>,
}

/// Result of redeeming a revival code.
#[derive(Debug, Clone)]
pub struct RevivalResolution {
    pub target: PlayerId,
    pub hearts: u32,
    pub events: Vec<BattleEvent>,
}

/// Who delivered the defeating blow.
#[derive(Debug, Clone, Copy)]
struct DefeatRecord {
    winning_team: u32,
    last_hit: PlayerId,
}

/// The live fight for one event-boss pairing.
#[derive(Debug)]
pub struct BattleInstance {
    config: EventBossConfig,
    deck: QuestionDeck,
    /// Increments on every reset; makes per-battle accumulation idempotent
    battle_seq: u64,
    phase: BattlePhase,
    boss_hp: u32,
    teams: Vec<Team>,
    seating: HashMap<PlayerId, u32>,
    started_at: Option<DateTime<Utc>>,
    cooldown_ends_at: Option<DateTime<Utc>>,
    defeat: Option<DefeatRecord>,
    question_generation: u64,
}

impl BattleInstance {
    /// Create the instance for an event-boss. Called by the registry on the
    /// first join for that id.
    pub fn new(config: EventBossConfig, deck: QuestionDeck) -> Result<Self, BattleError> {
        config.validate()?;
        let teams = (0..config.number_of_teams).map(Team::new).collect();
        Ok(Self {
            boss_hp: config.max_hp,
            config,
            deck,
            battle_seq: 1,
            phase: BattlePhase::Pending,
            teams,
            seating: HashMap::new(),
            started_at: None,
            cooldown_ends_at: None,
            defeat: None,
            question_generation: 0,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &EventBossConfig {
        &self.config
    }

    pub fn event_boss_id(&self) -> EventBossId {
        self.config.event_boss_id
    }

    pub fn phase(&self) -> BattlePhase {
        self.phase
    }

    pub fn boss_hp(&self) -> u32 {
        self.boss_hp
    }

    pub fn battle_seq(&self) -> u64 {
        self.battle_seq
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn cooldown_ends_at(&self) -> Option<DateTime<Utc>> {
        self.cooldown_ends_at
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn player_count(&self) -> u32 {
        self.seating.len() as u32
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&PlayerCombatState> {
        let team_index = *self.seating.get(&player_id)?;
        self.teams
            .get(team_index as usize)
            .and_then(|team| team.players.get(&player_id))
    }

    fn player_mut(&mut self, player_id: PlayerId) -> Option<&mut PlayerCombatState> {
        let team_index = *self.seating.get(&player_id)?;
        self.teams
            .get_mut(team_index as usize)
            .and_then(|team| team.players.get_mut(&player_id))
    }

    fn require_player(&self, player_id: PlayerId) -> Result<&PlayerCombatState, BattleError> {
        self.player(player_id)
            .ok_or_else(|| BattleError::PlayerNotInBattle(player_id.to_string()))
    }

    // =========================================================================
    // Joining and leaving
    // =========================================================================

    /// Seat a player on the team with the fewest members.
    ///
    /// A player who is already seated reconnects in place and keeps their
    /// combat state. The first seated player moves the battle `Pending →
    /// Active`.
    pub fn join(&mut self, player_id: PlayerId, nickname: Nickname) -> Result<JoinOutcome, BattleError> {
        if let Some(existing) = self.player_mut(player_id) {
            existing.connected = true;
            let team_index = existing.team_index;
            let event = BattleEvent::PlayerJoined {
                player_id,
                nickname: existing.nickname.as_str().to_string(),
                team_index,
                player_count: self.player_count(),
            };
            return Ok(JoinOutcome {
                team_index,
                rejoined: true,
                events: vec![event],
            });
        }

        let sizes: Vec<u32> = self.teams.iter().map(|t| t.len() as u32).collect();
        let team_index = balancer::assign(&sizes, self.config.max_players_per_team)?;

        let state = PlayerCombatState::new(
            player_id,
            nickname.clone(),
            team_index,
            self.config.policy.starting_hearts,
        );
        self.teams[team_index as usize]
            .players
            .insert(player_id, state);
        self.seating.insert(player_id, team_index);

        if self.phase == BattlePhase::Pending {
            self.phase = BattlePhase::Active;
        }

        Ok(JoinOutcome {
            team_index,
            rejoined: false,
            events: vec![BattleEvent::PlayerJoined {
                player_id,
                nickname: nickname.as_str().to_string(),
                team_index,
                player_count: self.player_count(),
            }],
        })
    }

    /// Mark a player's connection as dropped. Their outstanding question is
    /// abandoned to its deadline; they stay on the roster.
    pub fn disconnect(&mut self, player_id: PlayerId) {
        if let Some(player) = self.player_mut(player_id) {
            player.connected = false;
        }
    }

    /// Explicitly remove a player from the roster. Team cumulative damage
    /// is kept; the player's pending question dies with them.
    pub fn leave(&mut self, player_id: PlayerId) -> Result<Vec<BattleEvent>, BattleError> {
        let team_index = self
            .seating
            .remove(&player_id)
            .ok_or_else(|| BattleError::PlayerNotInBattle(player_id.to_string()))?;
        self.teams[team_index as usize].players.remove(&player_id);

        if self.seating.is_empty() && self.phase == BattlePhase::Active {
            self.phase = BattlePhase::Pending;
        }

        Ok(vec![BattleEvent::PlayerLeft {
            player_id,
            player_count: self.player_count(),
        }])
    }

    // =========================================================================
    // Question cycle
    // =========================================================================

    /// Issue the player's next question. The first successful issue of a
    /// fight moves the battle `Active → InBattle`.
    pub fn issue_question(
        &mut self,
        player_id: PlayerId,
        now: DateTime<Utc>,
        rng: impl FnMut(usize) -> usize,
    ) -> Result<IssuedQuestion, BattleError> {
        let player = self.require_player(player_id)?;
        match self.phase {
            BattlePhase::Active | BattlePhase::InBattle => {}
            BattlePhase::Pending => {
                return Err(BattleError::stale("battle has not begun"));
            }
            BattlePhase::Cooldown => {
                return Err(BattleError::stale("boss is defeated, waiting for the next fight"));
            }
        }
        if player.knocked_out {
            return Err(BattleError::KnockedOut);
        }
        if player.outstanding.is_some() {
            return Err(BattleError::AlreadyOutstanding);
        }

        let question = self.deck.deal(rng).clone();
        let deadline = now + Duration::milliseconds(question.time_limit_ms as i64);
        self.question_generation += 1;
        let generation = self.question_generation;

        let mut events = Vec::new();
        if self.phase == BattlePhase::Active {
            self.phase = BattlePhase::InBattle;
            self.started_at = Some(now);
            events.push(BattleEvent::BattleStarted { started_at: now });
        }

        let outstanding = OutstandingQuestion {
            question_id: question.id,
            correct_choice: question.correct_choice,
            time_limit_ms: question.time_limit_ms,
            issued_at: now,
            deadline,
            generation,
        };
        if let Some(player) = self.player_mut(player_id) {
            player.outstanding = Some(outstanding);
        }

        Ok(IssuedQuestion {
            question,
            deadline,
            generation,
            events,
        })
    }

    /// Resolve a submitted answer.
    ///
    /// The server-side elapsed time between issue and receipt is
    /// authoritative; the client-reported value is ignored for
    /// classification. A correct answer that finds the boss already at 0 in
    /// the serialized order is a [`CombatOutcome::RaceLoss`], not an error.
    pub fn submit_answer(
        &mut self,
        player_id: PlayerId,
        question_id: QuestionId,
        choice_index: u32,
        _client_reported_ms: Option<u64>,
        now: DateTime<Utc>,
        rng: impl FnMut(usize) -> usize,
    ) -> Result<AnswerResolution, BattleError> {
        let player = self.require_player(player_id)?;
        let outstanding = match player.outstanding.as_ref() {
            Some(o) if o.question_id == question_id => o,
            Some(_) | None => return Err(BattleError::NotFound(question_id.to_string())),
        };
        if matches!(self.phase, BattlePhase::Pending | BattlePhase::Active) {
            return Err(BattleError::stale("no fight in progress"));
        }
        if now > outstanding.deadline {
            // The scheduled deadline event applies the miss; the late
            // submission itself is only rejected.
            return Err(BattleError::Expired);
        }

        let elapsed_ms = (now - outstanding.issued_at).num_milliseconds().max(0) as u64;
        let tier = SpeedTier::classify(
            elapsed_ms,
            outstanding.time_limit_ms,
            self.config.policy.fast_band,
            self.config.policy.medium_band,
        );
        let correct = outstanding.correct_choice == choice_index;

        self.resolve(player_id, question_id, correct, tier, now, rng)
    }

    /// Resolve a deadline that elapsed without an answer. Returns `None`
    /// when the timer is stale (player answered, left, or the fight ended).
    pub fn deadline_elapsed(
        &mut self,
        player_id: PlayerId,
        generation: u64,
        now: DateTime<Utc>,
        rng: impl FnMut(usize) -> usize,
    ) -> Result<Option<AnswerResolution>, BattleError> {
        let Some(player) = self.player(player_id) else {
            return Ok(None);
        };
        let Some(outstanding) = player.outstanding.as_ref() else {
            return Ok(None);
        };
        if outstanding.generation != generation {
            return Ok(None);
        }
        if self.phase == BattlePhase::Cooldown {
            // Fight is over; the abandoned question no longer costs a heart.
            if let Some(player) = self.player_mut(player_id) {
                player.outstanding = None;
            }
            return Ok(None);
        }
        let question_id = outstanding.question_id;
        // A missed deadline is an incorrect, slowest-tier submission.
        self.resolve(player_id, question_id, false, SpeedTier::Slow, now, rng)
            .map(Some)
    }

    /// Apply a classified (correctness, tier) pair to shared state and emit
    /// one event per state change, after the mutation has applied.
    fn resolve(
        &mut self,
        player_id: PlayerId,
        question_id: QuestionId,
        correct: bool,
        tier: SpeedTier,
        now: DateTime<Utc>,
        rng: impl FnMut(usize) -> usize,
    ) -> Result<AnswerResolution, BattleError> {
        let team_index = *self
            .seating
            .get(&player_id)
            .ok_or_else(|| BattleError::PlayerNotInBattle(player_id.to_string()))?;
        let policy = self.config.policy.clone();
        let hp_before = self.boss_hp;
        let defeated_already = self.phase == BattlePhase::Cooldown;

        let mut events = Vec::new();
        let outcome;

        {
            let player = self
                .player_mut(player_id)
                .ok_or_else(|| BattleError::PlayerNotInBattle(player_id.to_string()))?;
            player.outstanding = None;
            player.questions_answered += 1;
            if correct {
                player.correct_answers += 1;
            }
        }

        if defeated_already {
            // Resolution arrived after HP already reached 0 in the
            // serialized order: counts toward totals, changes nothing else.
            outcome = CombatOutcome::RaceLoss;
        } else if correct {
            let applied = combat::apply_correct(&policy, tier, hp_before);
            self.boss_hp = applied.hp_after;
            self.teams[team_index as usize].total_damage += applied.damage as u64;
            if let Some(player) = self.player_mut(player_id) {
                player.damage_dealt += applied.damage as u64;
            }
            events.push(BattleEvent::BossDamaged {
                attacker: player_id,
                damage: applied.damage,
                boss_hp: applied.hp_after,
            });
            if applied.defeated {
                // This resolution observed HP > 0 and drove it to 0: it
                // wins the defeat race and the transition fires exactly once.
                let cooldown_ends_at = now + Duration::seconds(self.config.cooldown_secs as i64);
                self.phase = BattlePhase::Cooldown;
                self.cooldown_ends_at = Some(cooldown_ends_at);
                self.defeat = Some(DefeatRecord {
                    winning_team: team_index,
                    last_hit: player_id,
                });
                events.push(BattleEvent::BossDefeated {
                    winning_team: team_index,
                    last_hit: player_id,
                    cooldown_ends_at,
                });
            }
            outcome = CombatOutcome::Hit {
                damage: applied.damage,
                defeated: applied.defeated,
            };
        } else {
            let hearts_before = self
                .player(player_id)
                .map(|p| p.hearts)
                .unwrap_or_default();
            let loss = combat::apply_miss(hearts_before);
            let mut knockout_code = None;
            if let Some(player) = self.player_mut(player_id) {
                player.hearts = loss.hearts_remaining;
                if loss.knocked_out && !player.knocked_out {
                    player.knocked_out = true;
                    let code = RevivalCode::generate(rng);
                    player.revival_code = Some(code.clone());
                    knockout_code = Some(code);
                }
            }
            events.push(BattleEvent::HeartLost {
                player_id,
                hearts_remaining: loss.hearts_remaining,
                knocked_out: loss.knocked_out,
            });
            if let Some(code) = knockout_code {
                events.push(BattleEvent::PlayerKnockedOut {
                    player_id,
                    revival_code: code,
                });
            }
            outcome = CombatOutcome::Miss {
                hearts_remaining: loss.hearts_remaining,
                knocked_out: loss.knocked_out,
            };
        }

        Ok(AnswerResolution {
            player_id,
            question_id,
            correct,
            tier,
            outcome,
            events,
        })
    }

    // =========================================================================
    // Revival
    // =========================================================================

    /// Redeem a revival code on behalf of a knocked-out teammate.
    pub fn redeem_revival(
        &mut self,
        by_player: PlayerId,
        code: &str,
    ) -> Result<RevivalResolution, BattleError> {
        let redeemer_team = self.require_player(by_player)?.team_index;
        let presented = RevivalCode::parse(code);

        let target = self
            .teams
            .iter()
            .flat_map(|team| team.players.values())
            .find(|p| p.revival_code.as_ref() == Some(&presented))
            .map(|p| (p.player_id, p.team_index, p.knocked_out))
            .ok_or(BattleError::InvalidCode)?;
        let (target_id, target_team, knocked_out) = target;

        if target_id == by_player {
            return Err(BattleError::SelfRevival);
        }
        if target_team != redeemer_team {
            return Err(BattleError::validation(
                "only a teammate can redeem a revival code",
            ));
        }
        if !knocked_out {
            return Err(BattleError::AlreadyRevived);
        }

        let hearts = self.config.policy.revival_hearts;
        if let Some(player) = self.player_mut(target_id) {
            player.hearts = hearts;
            player.knocked_out = false;
        }

        Ok(RevivalResolution {
            target: target_id,
            hearts,
            events: vec![BattleEvent::PlayerRevived {
                player_id: target_id,
                revived_by: by_player,
                hearts,
            }],
        })
    }

    // =========================================================================
    // Defeat and reset
    // =========================================================================

    /// Winning team and last-hit player, present only after a defeat.
    pub fn defeat_outcome(&self) -> Option<(u32, PlayerId)> {
        self.defeat.map(|d| (d.winning_team, d.last_hit))
    }

    /// Reset for a new fight cycle once the cooldown has elapsed.
    ///
    /// The caller must have completed the leaderboard merge and badge
    /// evaluation before invoking this. Teams and combat state are cleared;
    /// players rejoin for the next fight.
    pub fn reset_for_next_cycle(&mut self) -> Result<Vec<BattleEvent>, BattleError> {
        if self.phase != BattlePhase::Cooldown {
            return Err(BattleError::stale("battle is not in cooldown"));
        }
        self.boss_hp = self.config.max_hp;
        self.battle_seq += 1;
        self.started_at = None;
        self.cooldown_ends_at = None;
        self.defeat = None;
        self.seating.clear();
        for team in &mut self.teams {
            team.total_damage = 0;
            team.players.clear();
        }
        self.phase = BattlePhase::Pending;
        Ok(vec![BattleEvent::BattleReset { boss_hp: self.boss_hp }])
    }
}
