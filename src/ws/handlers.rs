use crate::error::AppResult;
use crate::presence::PresenceStatus;
use crate::state::AppState;
use crate::ws::events::{ClientEvent, ServerEvent};
use crate::ws::registry::ConnectionId;
use axum::extract::{
    ws::{Message, WebSocket, WebSocketUpgrade},
    Query, State,
};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn bearer_token(params: &WsParams, headers: &HeaderMap) -> Option<String> {
    params.token.clone().or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.to_string())
    })
}

/// Connections that fail credential validation are rejected before any
/// room join is possible.
async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let token = match bearer_token(&params, &headers) {
        Some(token) => token,
        None => {
            error!("websocket connection rejected: no credential provided");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    let user_id = match state.auth.authenticate(&token).await {
        Ok(user_id) => user_id,
        Err(e) => {
            error!(error = %e, "websocket connection rejected: invalid credential");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(state, user_id, socket))
}

/// Register the connection and deliver `connection.established` before
/// anything else. Returns the receiver half of the connection's event
/// channel.
pub async fn open_session(
    state: &AppState,
    user_id: Uuid,
) -> (ConnectionId, UnboundedReceiver<ServerEvent>) {
    let connection_id = ConnectionId::new();
    let rx = state.registry.register(connection_id).await;
    state
        .registry
        .send_to(
            connection_id,
            ServerEvent::ConnectionEstablished {
                connection_id,
                user_id,
            },
        )
        .await;

    if state.presence.register(user_id, connection_id).await {
        state
            .registry
            .broadcast_all(ServerEvent::PresenceChanged {
                user_id,
                status: PresenceStatus::Online,
                timestamp: Utc::now(),
            })
            .await;
    }
    (connection_id, rx)
}

/// Synchronous teardown: leave all rooms, drop the sender, then settle
/// presence. Nothing is delivered to this connection afterwards.
pub async fn close_session(state: &AppState, connection_id: ConnectionId) {
    state.registry.unregister(connection_id).await;
    if let Some((user_id, became_offline)) = state.presence.unregister(connection_id).await {
        if became_offline {
            state
                .registry
                .broadcast_all(ServerEvent::PresenceChanged {
                    user_id,
                    status: PresenceStatus::Offline,
                    timestamp: Utc::now(),
                })
                .await;
        }
    }
}

/// Route one inbound client event to the owning component. Validation
/// failures are returned to the caller; the socket loop converts them to
/// an `error` event for this connection only.
pub async fn dispatch(
    state: &AppState,
    user_id: Uuid,
    connection_id: ConnectionId,
    event: ClientEvent,
) -> AppResult<()> {
    match event {
        ClientEvent::ConversationJoin { conversation_id } => {
            state
                .conversations
                .require_participant(conversation_id, user_id)
                .await?;
            state.registry.join(connection_id, conversation_id).await;
            Ok(())
        }
        ClientEvent::ConversationLeave { conversation_id } => {
            state.registry.leave(connection_id, conversation_id).await;
            Ok(())
        }
        ClientEvent::MessageSend {
            conversation_id,
            message_id,
            content,
            kind,
        } => {
            state
                .messages
                .send(
                    conversation_id,
                    user_id,
                    content,
                    kind,
                    message_id,
                    Some(connection_id),
                )
                .await?;
            Ok(())
        }
        ClientEvent::MessageEdit {
            message_id,
            content,
        } => {
            state
                .messages
                .edit(message_id, user_id, content, Some(connection_id))
                .await?;
            Ok(())
        }
        ClientEvent::MessageDelete { message_id, reason } => {
            state
                .messages
                .delete(message_id, user_id, reason, false, Some(connection_id))
                .await?;
            Ok(())
        }
        ClientEvent::TypingStart { conversation_id } => {
            state
                .conversations
                .require_participant(conversation_id, user_id)
                .await?;
            state.typing.start_typing(conversation_id, user_id).await;
            Ok(())
        }
        ClientEvent::TypingStop { conversation_id } => {
            state.typing.stop_typing(conversation_id, user_id).await;
            Ok(())
        }
        ClientEvent::MessageDelivered { message_id, .. } => {
            state.receipts.mark_delivered(message_id, user_id).await?;
            Ok(())
        }
        ClientEvent::MessageRead { message_id, .. } => {
            state.receipts.mark_read(message_id, user_id).await?;
            Ok(())
        }
        ClientEvent::PresenceOnline { conversation_ids } => {
            state.presence.touch(user_id).await;
            for conversation_id in conversation_ids {
                state
                    .conversations
                    .require_participant(conversation_id, user_id)
                    .await?;
                state.registry.join(connection_id, conversation_id).await;
            }
            Ok(())
        }
        ClientEvent::PresenceOffline => {
            state.registry.leave_all(connection_id).await;
            Ok(())
        }
    }
}

async fn handle_socket(state: AppState, user_id: Uuid, socket: WebSocket) {
    let (connection_id, mut rx) = open_session(&state, user_id).await;
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            // outbound: events fanned in from the registries
            maybe = rx.recv() => {
                let Some(event) = maybe else { break };
                match serde_json::to_string(&event) {
                    Ok(text) => {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!(%user_id, event = event.event_type(), error = %e, "failed to serialize outbound event");
                    }
                }
            }

            // inbound: client events
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => {
                                if let Err(e) = dispatch(&state, user_id, connection_id, event).await {
                                    state
                                        .registry
                                        .send_to(connection_id, ServerEvent::Error { reason: e.to_string() })
                                        .await;
                                }
                            }
                            Err(e) => {
                                warn!(%user_id, error = %e, "malformed client event");
                                state
                                    .registry
                                    .send_to(
                                        connection_id,
                                        ServerEvent::Error { reason: "malformed event payload".into() },
                                    )
                                    .await;
                            }
                        }
                    }
                    // ping/pong handled by the framework
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(%user_id, error = %e, "websocket transport error");
                        break;
                    }
                }
            }
        }
    }

    close_session(&state, connection_id).await;
}
