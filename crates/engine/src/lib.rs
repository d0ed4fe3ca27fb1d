//! QuizRaid Engine - real-time trivia boss-fight server
//!
//! Battles run as single-owner tasks behind a process-wide registry;
//! clients talk to them over WebSocket, and completed fights settle into
//! leaderboard and badge stores through injected ports.

pub mod api;
pub mod app;
pub mod battle;
pub mod error;
pub mod infrastructure;

pub use app::App;
pub use error::EngineError;
