//! Client-facing surface: WebSocket endpoint and connection tracking

pub mod connections;
pub mod websocket;

pub use connections::ConnectionManager;
