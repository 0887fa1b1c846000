//! Presence registry: which users currently have at least one live
//! connection. Registry state is a rebuildable overlay; nothing here is
//! durable.

use crate::ws::registry::ConnectionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

struct PresenceEntry {
    connections: HashSet<ConnectionId>,
    last_seen: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, PresenceEntry>,
    by_connection: HashMap<ConnectionId, Uuid>,
}

/// Multi-device aware: a user is online while any of their connections is
/// live, and transitions fire exactly once per edge.
#[derive(Default, Clone)]
pub struct PresenceRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when this registration took the user from offline to
    /// online (the caller broadcasts the transition).
    pub async fn register(&self, user_id: Uuid, connection_id: ConnectionId) -> bool {
        let mut guard = self.inner.lock().await;
        guard.by_connection.insert(connection_id, user_id);
        let entry = guard.users.entry(user_id).or_insert_with(|| PresenceEntry {
            connections: HashSet::new(),
            last_seen: Utc::now(),
        });
        entry.last_seen = Utc::now();
        let was_offline = entry.connections.is_empty();
        entry.connections.insert(connection_id);
        was_offline
    }

    /// Idempotent. Returns `(user_id, became_offline)` when the connection
    /// was known; `became_offline` is true only for the last connection.
    pub async fn unregister(&self, connection_id: ConnectionId) -> Option<(Uuid, bool)> {
        let mut guard = self.inner.lock().await;
        let user_id = guard.by_connection.remove(&connection_id)?;
        let entry = guard.users.get_mut(&user_id)?;
        entry.connections.remove(&connection_id);
        entry.last_seen = Utc::now();
        let became_offline = entry.connections.is_empty();
        Some((user_id, became_offline))
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        let guard = self.inner.lock().await;
        guard
            .users
            .get(&user_id)
            .map(|e| !e.connections.is_empty())
            .unwrap_or(false)
    }

    pub async fn list_online(&self) -> HashSet<Uuid> {
        let guard = self.inner.lock().await;
        guard
            .users
            .iter()
            .filter(|(_, e)| !e.connections.is_empty())
            .map(|(id, _)| *id)
            .collect()
    }

    pub async fn last_seen(&self, user_id: Uuid) -> Option<DateTime<Utc>> {
        let guard = self.inner.lock().await;
        guard.users.get(&user_id).map(|e| e.last_seen)
    }

    pub async fn touch(&self, user_id: Uuid) {
        let mut guard = self.inner.lock().await;
        if let Some(entry) = guard.users.get_mut(&user_id) {
            entry.last_seen = Utc::now();
        }
    }
}
