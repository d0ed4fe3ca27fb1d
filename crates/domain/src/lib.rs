//! QuizRaid Domain - battle state machine, combat rules, and invariants
//!
//! Pure domain logic for the real-time trivia boss-fight engine. No async,
//! no I/O, no RNG dependency: time is passed in as `DateTime<Utc>` and
//! randomness is injected as closures, so every rule here is deterministic
//! under test.

pub mod aggregates;
pub mod badges;
pub mod balancer;
pub mod combat;
pub mod entities;
pub mod error;
pub mod events;
pub mod ids;
pub mod leaderboard;
pub mod value_objects;

pub use aggregates::{
    AnswerResolution, BattleInstance, BattlePhase, IssuedQuestion, JoinOutcome,
    PlayerCombatState, RevivalResolution, Team,
};
pub use badges::{BadgeCode, BadgeGrant, BadgeScope};
pub use combat::CombatOutcome;
pub use entities::{Question, QuestionDeck};
pub use error::BattleError;
pub use events::BattleEvent;
pub use ids::{CategoryId, EventBossId, EventId, PlayerId, QuestionId};
pub use leaderboard::{BattleSnapshot, LeaderboardEntry, PlayerBattleStats};
pub use value_objects::{CombatPolicy, EventBossConfig, Nickname, RevivalCode, SpeedTier};
