//! Connection management for WebSocket clients.
//!
//! Tracks connected clients and their battle associations: which event-boss
//! they joined, as a fighter or previewer, and which team they sit on.

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use quizraid_domain::{EventBossId, PlayerId};
use quizraid_shared::ServerMessage;

/// Information about a connected client.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Unique ID for this connection
    pub connection_id: Uuid,
    /// Stable player identity, set once resolved at fight join
    pub player_id: Option<PlayerId>,
    pub nickname: Option<String>,
    /// The battle this connection is associated with (if joined)
    pub event_boss_id: Option<EventBossId>,
    /// Team seat, absent for previewers
    pub team_index: Option<u32>,
    /// True when the client only watches the lobby
    pub preview: bool,
}

/// Manages all active WebSocket connections.
pub struct ConnectionManager {
    /// Map of connection_id -> (ConnectionInfo, sender channel)
    connections: RwLock<HashMap<Uuid, (ConnectionInfo, mpsc::Sender<ServerMessage>)>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    pub async fn register(&self, connection_id: Uuid, sender: mpsc::Sender<ServerMessage>) {
        let info = ConnectionInfo {
            connection_id,
            player_id: None,
            nickname: None,
            event_boss_id: None,
            team_index: None,
            preview: false,
        };
        let mut connections = self.connections.write().await;
        connections.insert(connection_id, (info, sender));
        tracing::debug!(connection_id = %connection_id, "Connection registered");
    }

    /// Unregister a connection.
    pub async fn unregister(&self, connection_id: Uuid) {
        let mut connections = self.connections.write().await;
        if connections.remove(&connection_id).is_some() {
            tracing::debug!(connection_id = %connection_id, "Connection unregistered");
        }
    }

    /// Get connection info by ID.
    pub async fn get(&self, connection_id: Uuid) -> Option<ConnectionInfo> {
        let connections = self.connections.read().await;
        connections.get(&connection_id).map(|(info, _)| info.clone())
    }

    /// Associate a connection with a battle as a fighter.
    pub async fn join_battle(
        &self,
        connection_id: Uuid,
        event_boss_id: EventBossId,
        player_id: PlayerId,
        nickname: String,
        team_index: u32,
    ) {
        let mut connections = self.connections.write().await;
        if let Some((info, _)) = connections.get_mut(&connection_id) {
            info.event_boss_id = Some(event_boss_id);
            info.player_id = Some(player_id);
            info.nickname = Some(nickname);
            info.team_index = Some(team_index);
            info.preview = false;
            tracing::info!(
                connection_id = %connection_id,
                event_boss_id = %event_boss_id,
                player_id = %player_id,
                team_index,
                "Connection joined battle"
            );
        }
    }

    /// Associate a connection with a battle lobby as a previewer.
    pub async fn join_preview(&self, connection_id: Uuid, event_boss_id: EventBossId) {
        let mut connections = self.connections.write().await;
        if let Some((info, _)) = connections.get_mut(&connection_id) {
            info.event_boss_id = Some(event_boss_id);
            info.preview = true;
        }
    }

    /// Clear a connection's battle association.
    pub async fn leave_battle(&self, connection_id: Uuid) {
        let mut connections = self.connections.write().await;
        if let Some((info, _)) = connections.get_mut(&connection_id) {
            let old = info.event_boss_id.take();
            info.team_index = None;
            info.preview = false;
            if let Some(event_boss_id) = old {
                tracing::info!(
                    connection_id = %connection_id,
                    event_boss_id = %event_boss_id,
                    "Connection left battle"
                );
            }
        }
    }

    /// Send a message to one connection.
    pub async fn send_to_connection(&self, connection_id: Uuid, message: ServerMessage) {
        let connections = self.connections.read().await;
        if let Some((_, sender)) = connections.get(&connection_id) {
            if let Err(e) = sender.try_send(message) {
                tracing::warn!(connection_id = %connection_id, error = %e, "Failed to send");
            }
        }
    }

    /// Broadcast a message to every connection in a battle, previewers
    /// included.
    pub async fn broadcast_to_battle(&self, event_boss_id: EventBossId, message: ServerMessage) {
        let connections = self.connections.read().await;
        for (info, sender) in connections.values() {
            if info.event_boss_id == Some(event_boss_id) {
                if let Err(e) = sender.try_send(message.clone()) {
                    tracing::warn!(
                        connection_id = %info.connection_id,
                        error = %e,
                        "Failed to broadcast message"
                    );
                }
            }
        }
    }

    /// Broadcast a message to one team of a battle.
    pub async fn broadcast_to_team(
        &self,
        event_boss_id: EventBossId,
        team_index: u32,
        message: ServerMessage,
    ) {
        let connections = self.connections.read().await;
        for (info, sender) in connections.values() {
            if info.event_boss_id == Some(event_boss_id) && info.team_index == Some(team_index) {
                if let Err(e) = sender.try_send(message.clone()) {
                    tracing::warn!(
                        connection_id = %info.connection_id,
                        error = %e,
                        "Failed to broadcast to team"
                    );
                }
            }
        }
    }

    /// Send a message to a specific player's connection(s) in a battle.
    pub async fn send_to_player(
        &self,
        event_boss_id: EventBossId,
        player_id: PlayerId,
        message: ServerMessage,
    ) {
        let connections = self.connections.read().await;
        for (info, sender) in connections.values() {
            if info.event_boss_id == Some(event_boss_id) && info.player_id == Some(player_id) {
                if let Err(e) = sender.try_send(message.clone()) {
                    tracing::warn!(
                        connection_id = %info.connection_id,
                        error = %e,
                        "Failed to send to player"
                    );
                }
            }
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
