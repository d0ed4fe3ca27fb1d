//! Commands delivered to a battle task
//!
//! Every inbound action is a discrete message; replies travel back on
//! oneshot channels while broadcasts go out through the connection manager.

use tokio::sync::oneshot;

use quizraid_domain::{BattleError, Nickname, PlayerId, QuestionId, SpeedTier};
use quizraid_shared::{BattleStatusData, QuestionData};

/// Ack for a fight join.
#[derive(Debug, Clone)]
pub struct JoinReply {
    pub player_id: PlayerId,
    pub team_index: u32,
    pub status: BattleStatusData,
}

/// The issued question with its deadline.
#[derive(Debug, Clone)]
pub struct QuestionReply {
    pub question: QuestionData,
    pub deadline_ms: i64,
}

/// Direct outcome of a submitted answer.
#[derive(Debug, Clone)]
pub struct AnswerReply {
    pub correct: bool,
    pub damage: u32,
    pub response_category: SpeedTier,
    pub outcome: quizraid_domain::CombatOutcome,
    pub status: BattleStatusData,
}

/// Outcome of a revival redemption.
#[derive(Debug, Clone)]
pub struct RevivalReply {
    pub target: PlayerId,
    pub hearts: u32,
}

/// One inbound action for a battle task.
#[derive(Debug)]
pub enum BattleCommand {
    /// Seat a player (or reconnect one already seated)
    Join {
        player_id: PlayerId,
        nickname: Nickname,
        reply: oneshot::Sender<Result<JoinReply, BattleError>>,
    },
    /// Read-only lobby snapshot for preview joiners
    Preview {
        reply: oneshot::Sender<BattleStatusData>,
    },
    IssueQuestion {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<QuestionReply, BattleError>>,
    },
    SubmitAnswer {
        player_id: PlayerId,
        question_id: QuestionId,
        choice_index: u32,
        client_reported_ms: Option<u64>,
        reply: oneshot::Sender<Result<AnswerReply, BattleError>>,
    },
    RedeemRevival {
        player_id: PlayerId,
        code: String,
        reply: oneshot::Sender<Result<RevivalReply, BattleError>>,
    },
    /// Explicit leave; removes the player from the roster
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), BattleError>>,
    },
    /// Connection dropped without leaving; the roster entry stays
    Disconnected { player_id: PlayerId },

    // Scheduled/time-driven messages
    /// A question's answer window closed
    DeadlineElapsed { player_id: PlayerId, generation: u64 },
    /// Self-sent right after a defeat, once in-flight answers have drained
    Settle,
    /// The post-defeat cooldown ran out for the tagged fight cycle
    CooldownElapsed { battle_seq: u64 },
    /// Periodic liveness probe while the battle sits in `Pending`
    IdleCheck,
}
