use crate::ws::events::ServerEvent;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

/// Unique identifier for a live connection.
///
/// Assigned when a socket registers; used for precise cleanup on teardown
/// and for echo-suppression on broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnectionId, UnboundedSender<ServerEvent>>,
    // conversation_id -> joined connections
    rooms: HashMap<Uuid, HashSet<ConnectionId>>,
    // reverse index, so teardown can leave every room without a scan
    joined: HashMap<ConnectionId, HashSet<Uuid>>,
}

impl Inner {
    fn purge(&mut self, id: ConnectionId) {
        self.connections.remove(&id);
        if let Some(conversations) = self.joined.remove(&id) {
            for conversation_id in conversations {
                if let Some(members) = self.rooms.get_mut(&conversation_id) {
                    members.remove(&id);
                    if members.is_empty() {
                        self.rooms.remove(&conversation_id);
                    }
                }
            }
        }
    }
}

/// Room router: maps each conversation to the set of connections
/// subscribed to it and fans events out to them.
///
/// Broadcasts take the write lock, so delivery order within a room matches
/// the order operations were accepted in.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and return its event receiver.
    pub async fn register(&self, id: ConnectionId) -> UnboundedReceiver<ServerEvent> {
        let (tx, rx) = unbounded_channel();
        let mut guard = self.inner.write().await;
        guard.connections.insert(id, tx);
        rx
    }

    /// Drop the connection and remove it from every room it joined.
    /// Idempotent: unregistering an unknown connection is a no-op.
    pub async fn unregister(&self, id: ConnectionId) {
        let mut guard = self.inner.write().await;
        guard.purge(id);
    }

    /// Join a conversation room. Idempotent; unknown connections are
    /// ignored so a race with teardown cannot resurrect membership.
    pub async fn join(&self, id: ConnectionId, conversation_id: Uuid) {
        let mut guard = self.inner.write().await;
        if !guard.connections.contains_key(&id) {
            return;
        }
        guard.rooms.entry(conversation_id).or_default().insert(id);
        guard.joined.entry(id).or_default().insert(conversation_id);
    }

    pub async fn leave(&self, id: ConnectionId, conversation_id: Uuid) {
        let mut guard = self.inner.write().await;
        if let Some(members) = guard.rooms.get_mut(&conversation_id) {
            members.remove(&id);
            if members.is_empty() {
                guard.rooms.remove(&conversation_id);
            }
        }
        if let Some(conversations) = guard.joined.get_mut(&id) {
            conversations.remove(&conversation_id);
        }
    }

    /// Leave every room while keeping the connection registered.
    pub async fn leave_all(&self, id: ConnectionId) {
        let mut guard = self.inner.write().await;
        if let Some(conversations) = guard.joined.remove(&id) {
            for conversation_id in conversations {
                if let Some(members) = guard.rooms.get_mut(&conversation_id) {
                    members.remove(&id);
                    if members.is_empty() {
                        guard.rooms.remove(&conversation_id);
                    }
                }
            }
        }
    }

    pub async fn is_joined(&self, id: ConnectionId, conversation_id: Uuid) -> bool {
        let guard = self.inner.read().await;
        guard
            .rooms
            .get(&conversation_id)
            .map(|members| members.contains(&id))
            .unwrap_or(false)
    }

    pub async fn member_count(&self, conversation_id: Uuid) -> usize {
        let guard = self.inner.read().await;
        guard.rooms.get(&conversation_id).map(|m| m.len()).unwrap_or(0)
    }

    /// Deliver an event to every connection joined to the conversation,
    /// optionally excluding the originating connection. Dead connections
    /// are cleaned up on the way.
    pub async fn broadcast(
        &self,
        conversation_id: Uuid,
        event: ServerEvent,
        exclude: Option<ConnectionId>,
    ) {
        let mut guard = self.inner.write().await;
        let members: Vec<ConnectionId> = match guard.rooms.get(&conversation_id) {
            Some(members) => members
                .iter()
                .copied()
                .filter(|id| Some(*id) != exclude)
                .collect(),
            None => return,
        };

        let mut dead = Vec::new();
        for id in members {
            let alive = guard
                .connections
                .get(&id)
                .map(|tx| tx.send(event.clone()).is_ok())
                .unwrap_or(false);
            if !alive {
                dead.push(id);
            }
        }
        for id in dead {
            tracing::debug!(?id, %conversation_id, "dropping dead subscriber");
            guard.purge(id);
        }
    }

    /// Deliver an event to every registered connection (presence changes).
    pub async fn broadcast_all(&self, event: ServerEvent) {
        let mut guard = self.inner.write().await;
        let ids: Vec<ConnectionId> = guard.connections.keys().copied().collect();
        let mut dead = Vec::new();
        for id in ids {
            let alive = guard
                .connections
                .get(&id)
                .map(|tx| tx.send(event.clone()).is_ok())
                .unwrap_or(false);
            if !alive {
                dead.push(id);
            }
        }
        for id in dead {
            guard.purge(id);
        }
    }

    /// Send an event to one connection. Returns false if it is gone.
    pub async fn send_to(&self, id: ConnectionId, event: ServerEvent) -> bool {
        let guard = self.inner.read().await;
        guard
            .connections
            .get(&id)
            .map(|tx| tx.send(event).is_ok())
            .unwrap_or(false)
    }
}
