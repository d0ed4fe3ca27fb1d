//! Live battle execution
//!
//! Each live battle is one tokio task exclusively owning its
//! `BattleInstance`. Inbound actions become `BattleCommand` messages on the
//! task's channel, which is the single serialization point required for
//! exact HP accounting and a defeat transition that fires exactly once.

pub mod commands;
pub mod registry;
pub mod runner;
pub mod status;

pub use commands::BattleCommand;
pub use registry::BattleRegistry;
