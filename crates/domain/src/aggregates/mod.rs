//! Aggregates - consistency boundaries with exclusive ownership

pub mod battle;

pub use battle::{
    AnswerResolution, BattleInstance, BattlePhase, IssuedQuestion, JoinOutcome,
    OutstandingQuestion, PlayerCombatState, RevivalResolution, Team,
};
