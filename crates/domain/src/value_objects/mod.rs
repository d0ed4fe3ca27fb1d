//! Value objects - validated, immutable building blocks of the battle domain

mod config;
mod nickname;
mod revival_code;
mod speed;

pub use config::{CombatPolicy, EventBossConfig};
pub use nickname::Nickname;
pub use revival_code::RevivalCode;
pub use speed::SpeedTier;
