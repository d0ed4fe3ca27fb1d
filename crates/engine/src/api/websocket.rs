//! WebSocket handling for player connections.
//!
//! Parses `ClientMessage` frames, routes actions to the owning battle task,
//! and forwards broadcasts back out through a per-connection channel.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use quizraid_domain::{BattleError, EventBossId, Nickname, PlayerId, QuestionId};
use quizraid_shared::{ClientMessage, ErrorCode, ServerMessage};

use crate::app::App;
use crate::battle::commands::BattleCommand;
use crate::error::EngineError;

use super::connections::ConnectionManager;

/// Buffer size for per-connection message channel.
const CONNECTION_CHANNEL_BUFFER: usize = 256;

/// Combined state for WebSocket handlers.
pub struct WsState {
    pub app: Arc<App>,
    pub connections: Arc<ConnectionManager>,
}

/// WebSocket upgrade handler - entry point for new connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let connection_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(CONNECTION_CHANNEL_BUFFER);

    state.connections.register(connection_id, tx.clone()).await;
    tracing::info!(connection_id = %connection_id, "WebSocket connection established");

    // Forward messages from the channel to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => {
                    if let Some(response) = handle_message(msg, &state, connection_id).await {
                        if tx.try_send(response).is_err() {
                            tracing::warn!(
                                connection_id = %connection_id,
                                "Failed to send response, channel full or closed"
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(connection_id = %connection_id, error = %e, "Failed to parse message");
                    let error = ServerMessage::Error {
                        code: ErrorCode::ParseError,
                        message: format!("Invalid message format: {}", e),
                    };
                    let _ = tx.try_send(error);
                }
            },
            Ok(Message::Ping(_)) => {
                let _ = tx.try_send(ServerMessage::Pong);
            }
            Ok(Message::Close(_)) => {
                tracing::info!(connection_id = %connection_id, "WebSocket closed by client");
                break;
            }
            Err(e) => {
                tracing::error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // A dropped fighter keeps their seat; tell the battle they went quiet
    if let Some(info) = state.connections.get(connection_id).await {
        if let (Some(event_boss_id), Some(player_id), false) =
            (info.event_boss_id, info.player_id, info.preview)
        {
            if let Some(handle) = state.app.registry.live(event_boss_id) {
                let _ = handle.send(BattleCommand::Disconnected { player_id }).await;
            }
        }
    }
    state.connections.unregister(connection_id).await;
    send_task.abort();

    tracing::info!(connection_id = %connection_id, "WebSocket connection terminated");
}

/// Dispatch a parsed client message to the appropriate handler.
async fn handle_message(
    msg: ClientMessage,
    state: &WsState,
    connection_id: Uuid,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Heartbeat => Some(ServerMessage::Pong),

        ClientMessage::JoinBossPreview { event_boss_id } => {
            handle_join_preview(state, connection_id, EventBossId::from_uuid(event_boss_id)).await
        }

        ClientMessage::JoinBossFight {
            event_boss_id,
            nickname,
            session_token,
            join_code,
        } => {
            handle_join_fight(
                state,
                connection_id,
                EventBossId::from_uuid(event_boss_id),
                nickname,
                session_token,
                join_code,
            )
            .await
        }

        ClientMessage::RequestQuestion { event_boss_id } => {
            handle_request_question(state, connection_id, EventBossId::from_uuid(event_boss_id))
                .await
        }

        ClientMessage::SubmitAnswer {
            event_boss_id,
            question_id,
            choice_index,
            response_time_ms,
        } => {
            handle_submit_answer(
                state,
                connection_id,
                EventBossId::from_uuid(event_boss_id),
                QuestionId::from_uuid(question_id),
                choice_index,
                response_time_ms,
            )
            .await
        }

        ClientMessage::RedeemRevival { event_boss_id, code } => {
            handle_redeem_revival(state, connection_id, EventBossId::from_uuid(event_boss_id), code)
                .await
        }

        ClientMessage::LeaveBattle { event_boss_id } => {
            handle_leave(state, connection_id, EventBossId::from_uuid(event_boss_id)).await
        }
    }
}

// =============================================================================
// Handler Implementations
// =============================================================================

async fn handle_join_preview(
    state: &WsState,
    connection_id: Uuid,
    event_boss_id: EventBossId,
) -> Option<ServerMessage> {
    let handle = match state.app.registry.obtain(event_boss_id).await {
        Ok(handle) => handle,
        Err(e) => return Some(engine_error(e)),
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    if handle.send(BattleCommand::Preview { reply: reply_tx }).await.is_err() {
        return Some(engine_error(EngineError::BattleUnavailable));
    }
    let status = match reply_rx.await {
        Ok(status) => status,
        Err(_) => return Some(engine_error(EngineError::BattleUnavailable)),
    };

    state.connections.join_preview(connection_id, event_boss_id).await;
    Some(ServerMessage::BossPreviewJoined { status })
}

async fn handle_join_fight(
    state: &WsState,
    connection_id: Uuid,
    event_boss_id: EventBossId,
    nickname: String,
    session_token: Option<String>,
    join_code: Option<String>,
) -> Option<ServerMessage> {
    let nickname = match Nickname::try_from(nickname) {
        Ok(n) => n,
        Err(e) => return Some(engine_error(EngineError::Battle(e))),
    };

    let config = match state.app.directory.config(event_boss_id).await {
        Ok(Some(config)) => config,
        Ok(None) => {
            return Some(engine_error(EngineError::Battle(BattleError::NotFound(
                format!("event-boss {event_boss_id} is not configured"),
            ))));
        }
        Err(e) => return Some(engine_error(EngineError::Port(e))),
    };
    // A configured join code gates entry; without one the fight is open
    if let Some(expected) = &config.join_code {
        if join_code.as_deref().map(str::trim) != Some(expected.as_str()) {
            return Some(engine_error(EngineError::Battle(BattleError::InvalidCode)));
        }
    }

    let identity = match state.app.identity.resolve(session_token).await {
        Ok(identity) => identity,
        Err(e) => return Some(engine_error(EngineError::Port(e))),
    };

    let handle = match state.app.registry.obtain(event_boss_id).await {
        Ok(handle) => handle,
        Err(e) => return Some(engine_error(e)),
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    let command = BattleCommand::Join {
        player_id: identity.player_id,
        nickname: nickname.clone(),
        reply: reply_tx,
    };
    let reply = match send_command(&handle, command, reply_rx).await {
        Ok(reply) => reply,
        Err(e) => return Some(engine_error(e)),
    };

    state
        .connections
        .join_battle(
            connection_id,
            event_boss_id,
            reply.player_id,
            nickname.as_str().to_string(),
            reply.team_index,
        )
        .await;

    Some(ServerMessage::BattleJoined {
        player_id: reply.player_id.to_uuid(),
        team_index: reply.team_index,
        status: reply.status,
    })
}

async fn handle_request_question(
    state: &WsState,
    connection_id: Uuid,
    event_boss_id: EventBossId,
) -> Option<ServerMessage> {
    let player_id = match fighter_id(state, connection_id, event_boss_id).await {
        Ok(id) => id,
        Err(e) => return Some(engine_error(e)),
    };
    let handle = match battle_handle(state, event_boss_id) {
        Ok(handle) => handle,
        Err(e) => return Some(engine_error(e)),
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    let command = BattleCommand::IssueQuestion { player_id, reply: reply_tx };
    match send_command(&handle, command, reply_rx).await {
        Ok(reply) => Some(ServerMessage::QuestionReceived {
            question: reply.question,
            deadline_ms: reply.deadline_ms,
        }),
        Err(e) => Some(engine_error(e)),
    }
}

async fn handle_submit_answer(
    state: &WsState,
    connection_id: Uuid,
    event_boss_id: EventBossId,
    question_id: QuestionId,
    choice_index: u32,
    response_time_ms: Option<u64>,
) -> Option<ServerMessage> {
    let player_id = match fighter_id(state, connection_id, event_boss_id).await {
        Ok(id) => id,
        Err(e) => return Some(engine_error(e)),
    };
    let handle = match battle_handle(state, event_boss_id) {
        Ok(handle) => handle,
        Err(e) => return Some(engine_error(e)),
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    let command = BattleCommand::SubmitAnswer {
        player_id,
        question_id,
        choice_index,
        client_reported_ms: response_time_ms,
        reply: reply_tx,
    };
    match send_command(&handle, command, reply_rx).await {
        Ok(reply) => Some(ServerMessage::AnswerResult {
            correct: reply.correct,
            damage: reply.damage,
            response_category: reply.response_category,
            outcome: reply.outcome,
            status: reply.status,
        }),
        Err(e) => Some(engine_error(e)),
    }
}

async fn handle_redeem_revival(
    state: &WsState,
    connection_id: Uuid,
    event_boss_id: EventBossId,
    code: String,
) -> Option<ServerMessage> {
    let player_id = match fighter_id(state, connection_id, event_boss_id).await {
        Ok(id) => id,
        Err(e) => return Some(engine_error(e)),
    };
    let handle = match battle_handle(state, event_boss_id) {
        Ok(handle) => handle,
        Err(e) => return Some(engine_error(e)),
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    let command = BattleCommand::RedeemRevival { player_id, code, reply: reply_tx };
    match send_command(&handle, command, reply_rx).await {
        // The revival broadcast already went out to the whole battle
        Ok(_) => None,
        Err(e) => Some(engine_error(e)),
    }
}

async fn handle_leave(
    state: &WsState,
    connection_id: Uuid,
    event_boss_id: EventBossId,
) -> Option<ServerMessage> {
    let player_id = match fighter_id(state, connection_id, event_boss_id).await {
        Ok(id) => id,
        Err(e) => return Some(engine_error(e)),
    };
    let handle = match battle_handle(state, event_boss_id) {
        Ok(handle) => handle,
        Err(e) => return Some(engine_error(e)),
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    let command = BattleCommand::Leave { player_id, reply: reply_tx };
    match send_command(&handle, command, reply_rx).await {
        Ok(()) => {
            state.connections.leave_battle(connection_id).await;
            None
        }
        Err(e) => Some(engine_error(e)),
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// The caller's seated player id, verified against the targeted battle.
async fn fighter_id(
    state: &WsState,
    connection_id: Uuid,
    event_boss_id: EventBossId,
) -> Result<PlayerId, EngineError> {
    let info = state
        .connections
        .get(connection_id)
        .await
        .ok_or(EngineError::BattleUnavailable)?;
    if info.preview || info.event_boss_id != Some(event_boss_id) {
        return Err(BattleError::PlayerNotInBattle(
            "connection has not joined this fight".to_string(),
        )
        .into());
    }
    info.player_id.ok_or_else(|| {
        BattleError::PlayerNotInBattle("connection has not joined this fight".to_string()).into()
    })
}

fn battle_handle(
    state: &WsState,
    event_boss_id: EventBossId,
) -> Result<mpsc::Sender<BattleCommand>, EngineError> {
    state
        .app
        .registry
        .live(event_boss_id)
        .ok_or(EngineError::BattleUnavailable)
}

/// Deliver a command and await its oneshot reply.
async fn send_command<T>(
    handle: &mpsc::Sender<BattleCommand>,
    command: BattleCommand,
    reply_rx: oneshot::Receiver<Result<T, BattleError>>,
) -> Result<T, EngineError> {
    if handle.send(command).await.is_err() {
        return Err(EngineError::BattleUnavailable);
    }
    match reply_rx.await {
        Ok(result) => result.map_err(EngineError::from),
        Err(_) => Err(EngineError::BattleUnavailable),
    }
}

fn engine_error(err: EngineError) -> ServerMessage {
    ServerMessage::Error {
        code: err.wire_code(),
        message: err.to_string(),
    }
}
