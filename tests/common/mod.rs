//! Shared fixtures for the integration tests: an app state over the
//! in-memory store, and session plumbing that drives the event loop
//! without a real socket.

#![allow(dead_code)]

use loadboard_chat_service::auth::StaticTokenAuth;
use loadboard_chat_service::config::Config;
use loadboard_chat_service::models::{Conversation, ConversationKind};
use loadboard_chat_service::state::AppState;
use loadboard_chat_service::storage::InMemoryStore;
use loadboard_chat_service::ws::events::ServerEvent;
use loadboard_chat_service::ws::handlers::open_session;
use loadboard_chat_service::ws::registry::ConnectionId;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

pub fn test_state() -> AppState {
    AppState::new(
        Arc::new(Config::test_defaults()),
        Arc::new(InMemoryStore::new()),
        Arc::new(StaticTokenAuth::default()),
    )
}

/// Open a session for the user, swallowing the `connection.established`
/// hello and the user's own presence fan-out so tests start from a quiet
/// channel.
pub async fn connect(
    state: &AppState,
    user_id: Uuid,
) -> (ConnectionId, UnboundedReceiver<ServerEvent>) {
    let (connection_id, mut rx) = open_session(state, user_id).await;
    let hello = rx.recv().await.expect("connection.established");
    assert_eq!(hello.event_type(), "connection.established");
    drain(&mut rx);
    (connection_id, rx)
}

pub async fn open_room(state: &AppState, a: Uuid, b: Uuid) -> Conversation {
    state
        .conversations
        .open(a, b, ConversationKind::General, None)
        .await
        .expect("open conversation")
}

/// Everything currently buffered on the channel, without waiting.
pub fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

pub fn event_types(events: &[ServerEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.event_type()).collect()
}
