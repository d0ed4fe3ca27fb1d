//! End-to-end battle flows through the registry and battle tasks.
//!
//! Drives fights with `BattleCommand`s and observes broadcasts through fake
//! connections registered with the connection manager, exactly as the
//! WebSocket layer would.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use uuid::Uuid;

use quizraid_domain::{
    BadgeCode, CategoryId, CombatOutcome, CombatPolicy, EventBossConfig, EventBossId, EventId,
    Nickname, PlayerId, Question, QuestionId, SpeedTier,
};
use quizraid_engine::api::ConnectionManager;
use quizraid_engine::battle::commands::{AnswerReply, BattleCommand, JoinReply, QuestionReply};
use quizraid_engine::battle::registry::BattleRegistry;
use quizraid_engine::battle::runner::RunnerDeps;
use quizraid_engine::infrastructure::memory::{
    InMemoryBadgeStore, InMemoryEventBossDirectory, InMemoryLeaderboardStore,
    InMemoryQuestionSource,
};
use quizraid_engine::infrastructure::ports::{BadgeStore, LeaderboardStore};
use quizraid_shared::{PhaseData, ServerMessage};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

struct Harness {
    registry: Arc<BattleRegistry>,
    connections: Arc<ConnectionManager>,
    leaderboard: Arc<InMemoryLeaderboardStore>,
    badges: Arc<InMemoryBadgeStore>,
}

fn fight_config(max_hp: u32, number_of_teams: u32) -> EventBossConfig {
    EventBossConfig {
        event_id: EventId::new(),
        event_boss_id: EventBossId::new(),
        boss_name: "Void Wyrm".to_string(),
        max_hp,
        cooldown_secs: 1,
        number_of_teams,
        max_players_per_team: None,
        join_code: None,
        category_id: CategoryId::new(),
        policy: CombatPolicy::default(),
    }
}

/// Every seeded question has choice 0 correct, so tests can answer
/// deterministically.
fn harness(config: EventBossConfig, time_limit_ms: u64, idle_grace: Duration) -> Harness {
    let questions = Arc::new(InMemoryQuestionSource::new());
    questions.add_category(
        config.category_id,
        (0..4)
            .map(|i| Question {
                id: QuestionId::new(),
                category_id: config.category_id,
                text: format!("question {i}"),
                choices: vec!["right".into(), "wrong".into(), "also wrong".into()],
                correct_choice: 0,
                time_limit_ms,
            })
            .collect(),
    );

    let directory = Arc::new(InMemoryEventBossDirectory::new());
    directory.add(config.clone());

    let leaderboard = Arc::new(InMemoryLeaderboardStore::new());
    let badges = Arc::new(InMemoryBadgeStore::new());
    let connections = Arc::new(ConnectionManager::new());

    let deps = RunnerDeps {
        connections: connections.clone(),
        leaderboard: leaderboard.clone(),
        badges: badges.clone(),
        directory: directory.clone(),
        idle_grace,
    };
    let registry = Arc::new(BattleRegistry::new(questions, deps));

    Harness {
        registry,
        connections,
        leaderboard,
        badges,
    }
}

async fn join(
    handle: &mpsc::Sender<BattleCommand>,
    player_id: PlayerId,
    nickname: &str,
) -> JoinReply {
    let (tx, rx) = oneshot::channel();
    handle
        .send(BattleCommand::Join {
            player_id,
            nickname: Nickname::try_from(nickname.to_string()).expect("valid nickname"),
            reply: tx,
        })
        .await
        .expect("battle task alive");
    rx.await.expect("reply").expect("join accepted")
}

async fn request_question(
    handle: &mpsc::Sender<BattleCommand>,
    player_id: PlayerId,
) -> QuestionReply {
    let (tx, rx) = oneshot::channel();
    handle
        .send(BattleCommand::IssueQuestion { player_id, reply: tx })
        .await
        .expect("battle task alive");
    rx.await.expect("reply").expect("question issued")
}

async fn submit(
    handle: &mpsc::Sender<BattleCommand>,
    player_id: PlayerId,
    question_id: Uuid,
    choice_index: u32,
) -> AnswerReply {
    let (tx, rx) = oneshot::channel();
    handle
        .send(BattleCommand::SubmitAnswer {
            player_id,
            question_id: QuestionId::from_uuid(question_id),
            choice_index,
            client_reported_ms: None,
            reply: tx,
        })
        .await
        .expect("battle task alive");
    rx.await.expect("reply").expect("answer accepted")
}

/// Register a fake client connection seated in the battle.
async fn connect(
    connections: &ConnectionManager,
    event_boss_id: EventBossId,
    player_id: PlayerId,
    nickname: &str,
    team_index: u32,
) -> mpsc::Receiver<ServerMessage> {
    let connection_id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(64);
    connections.register(connection_id, tx).await;
    connections
        .join_battle(
            connection_id,
            event_boss_id,
            player_id,
            nickname.to_string(),
            team_index,
        )
        .await;
    rx
}

/// Drain broadcasts until one matches, failing the test on timeout.
async fn recv_matching<F>(rx: &mut mpsc::Receiver<ServerMessage>, mut pred: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    timeout(RECV_TIMEOUT, async {
        loop {
            let msg = rx.recv().await.expect("broadcast channel open");
            if pred(&msg) {
                return msg;
            }
        }
    })
    .await
    .expect("expected broadcast before timeout")
}

#[tokio::test]
async fn test_single_fast_answer_defeats_boss_and_settles() {
    let config = fight_config(40, 2);
    let h = harness(config.clone(), 30_000, Duration::from_secs(300));
    let boss = config.event_boss_id;

    let handle = h.registry.obtain(boss).await.expect("battle spawns");
    let player = PlayerId::new();
    let joined = join(&handle, player, "Ada").await;
    let mut rx = connect(&h.connections, boss, player, "Ada", joined.team_index).await;

    let question = request_question(&handle, player).await;
    let reply = submit(&handle, player, question.question.id, 0).await;

    assert!(reply.correct);
    assert_eq!(reply.response_category, SpeedTier::Fast);
    assert_eq!(reply.damage, 40);
    assert!(matches!(reply.outcome, CombatOutcome::Hit { defeated: true, .. }));
    assert_eq!(reply.status.phase, PhaseData::Cooldown);
    assert_eq!(reply.status.boss_hp, 0);

    recv_matching(&mut rx, |m| matches!(m, ServerMessage::PlayerAttacked { damage: 40, .. })).await;
    let defeated = recv_matching(&mut rx, |m| matches!(m, ServerMessage::BossDefeated { .. })).await;
    match defeated {
        ServerMessage::BossDefeated { winning_team, last_hit, .. } => {
            assert_eq!(winning_team, joined.team_index);
            assert_eq!(last_hit, player.to_uuid());
        }
        other => panic!("unexpected message: {other:?}"),
    }

    // Settlement runs off-task; poll the stores until it lands
    let entry = timeout(RECV_TIMEOUT, async {
        loop {
            if let Some(entry) = h
                .leaderboard
                .entry(player, boss)
                .await
                .expect("store reachable")
            {
                return entry;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("settlement completes");
    assert_eq!(entry.total_damage, 40);
    assert_eq!(entry.total_correct, 1);
    assert_eq!(entry.battles_participated, 1);

    let grants = h.badges.grants_for_player(player).await.expect("grants");
    let codes: Vec<BadgeCode> = grants.iter().map(|g| g.code).collect();
    assert!(codes.contains(&BadgeCode::BossDefeatedTeam));
    assert!(codes.contains(&BadgeCode::Mvp));
    assert!(codes.contains(&BadgeCode::LastHit));
    // The event's only boss is down, so the hero badge lands too
    assert!(codes.contains(&BadgeCode::Hero));

    // After the 1s cooldown the boss respawns at full HP with teams cleared;
    // players go through the join flow again for the next fight
    let reset = recv_matching(&mut rx, |m| matches!(m, ServerMessage::BattleReset { .. })).await;
    match reset {
        ServerMessage::BattleReset { status } => {
            assert_eq!(status.boss_hp, 40);
            assert_eq!(status.phase, PhaseData::Pending);
            assert_eq!(status.player_count, 0);
        }
        other => panic!("unexpected message: {other:?}"),
    }

    let rejoined = join(&handle, player, "Ada").await;
    assert_eq!(rejoined.status.phase, PhaseData::Active);
}

#[tokio::test]
async fn test_three_misses_knock_out_and_teammate_revives() {
    let config = fight_config(10_000, 1);
    let h = harness(config.clone(), 30_000, Duration::from_secs(300));
    let boss = config.event_boss_id;

    let handle = h.registry.obtain(boss).await.expect("battle spawns");
    let ada = PlayerId::new();
    let grace = PlayerId::new();
    let ada_join = join(&handle, ada, "Ada").await;
    let grace_join = join(&handle, grace, "Grace").await;
    assert_eq!(ada_join.team_index, grace_join.team_index);

    let mut ada_rx = connect(&h.connections, boss, ada, "Ada", ada_join.team_index).await;
    let mut grace_rx = connect(&h.connections, boss, grace, "Grace", grace_join.team_index).await;

    let mut last_hearts = 0;
    for _ in 0..3 {
        let question = request_question(&handle, ada).await;
        let reply = submit(&handle, ada, question.question.id, 1).await;
        assert!(!reply.correct);
        match reply.outcome {
            CombatOutcome::Miss { hearts_remaining, .. } => last_hearts = hearts_remaining,
            other => panic!("expected a miss, got {other:?}"),
        }
    }
    assert_eq!(last_hearts, 0);

    // The code reaches only the knocked-out player; teammates get the alert
    let knocked = recv_matching(&mut ada_rx, |m| {
        matches!(m, ServerMessage::PlayerKnockedOut { .. })
    })
    .await;
    let code = match knocked {
        ServerMessage::PlayerKnockedOut { revival_code } => revival_code,
        other => panic!("unexpected message: {other:?}"),
    };
    recv_matching(&mut grace_rx, |m| {
        matches!(m, ServerMessage::TeammateKnockedOut { .. })
    })
    .await;

    // Knocked-out players cannot draw questions
    let (tx, rx) = oneshot::channel();
    handle
        .send(BattleCommand::IssueQuestion { player_id: ada, reply: tx })
        .await
        .expect("battle task alive");
    assert!(rx.await.expect("reply").is_err());

    // Self-revival is rejected; a teammate's redemption works once
    let (tx, rx) = oneshot::channel();
    handle
        .send(BattleCommand::RedeemRevival { player_id: ada, code: code.clone(), reply: tx })
        .await
        .expect("battle task alive");
    assert!(rx.await.expect("reply").is_err());

    let (tx, rx) = oneshot::channel();
    handle
        .send(BattleCommand::RedeemRevival { player_id: grace, code: code.clone(), reply: tx })
        .await
        .expect("battle task alive");
    let revival = rx.await.expect("reply").expect("revival accepted");
    assert_eq!(revival.target, ada);
    assert_eq!(revival.hearts, 1);

    recv_matching(&mut grace_rx, |m| matches!(m, ServerMessage::PlayerRevived { .. })).await;

    // Replaying the spent code fails
    let (tx, rx) = oneshot::channel();
    handle
        .send(BattleCommand::RedeemRevival { player_id: grace, code, reply: tx })
        .await
        .expect("battle task alive");
    assert!(rx.await.expect("reply").is_err());

    // Back in the fight
    let question = request_question(&handle, ada).await;
    let reply = submit(&handle, ada, question.question.id, 0).await;
    assert!(reply.correct);
}

#[tokio::test]
async fn test_unanswered_question_costs_a_heart() {
    let config = fight_config(10_000, 1);
    let h = harness(config.clone(), 80, Duration::from_secs(300));
    let boss = config.event_boss_id;

    let handle = h.registry.obtain(boss).await.expect("battle spawns");
    let player = PlayerId::new();
    let joined = join(&handle, player, "Ada").await;
    let mut rx = connect(&h.connections, boss, player, "Ada", joined.team_index).await;

    let _question = request_question(&handle, player).await;
    // No submission; the 80ms deadline fires a miss
    let lost = recv_matching(&mut rx, |m| matches!(m, ServerMessage::PlayerLostHeart { .. })).await;
    match lost {
        ServerMessage::PlayerLostHeart { hearts_remaining, knocked_out, .. } => {
            assert_eq!(hearts_remaining, 2);
            assert!(!knocked_out);
        }
        other => panic!("unexpected message: {other:?}"),
    }

    // The slot is free again afterwards
    let _question = request_question(&handle, player).await;
}

#[tokio::test]
async fn test_registry_reuses_live_battles_and_sweeps_dead_ones() {
    let config = fight_config(100, 2);
    let h = harness(config.clone(), 30_000, Duration::from_millis(100));
    let boss = config.event_boss_id;

    let first = h.registry.obtain(boss).await.expect("battle spawns");
    let second = h.registry.obtain(boss).await.expect("battle reused");
    assert!(first.same_channel(&second));
    assert_eq!(h.registry.len(), 1);

    // Never joined, so the task exits after the idle grace
    drop(second);
    timeout(RECV_TIMEOUT, async {
        while !first.is_closed() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("idle battle shuts down");

    h.registry.sweep();
    assert!(h.registry.is_empty());

    // The next lookup spawns a fresh task
    let fresh = h.registry.obtain(boss).await.expect("battle respawns");
    assert!(!fresh.is_closed());
}

#[tokio::test]
async fn test_unknown_boss_is_rejected() {
    let config = fight_config(100, 2);
    let h = harness(config, 30_000, Duration::from_secs(300));
    let missing = EventBossId::new();
    assert!(h.registry.obtain(missing).await.is_err());
}
