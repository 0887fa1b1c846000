//! Typing coordinator: ephemeral per-(conversation, user) typing state
//! with automatic expiry. The server-side timeout is authoritative;
//! clients debounce their `typing.start` signals but never own expiry.

use crate::ws::events::ServerEvent;
use crate::ws::registry::ConnectionRegistry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

type TypingKey = (Uuid, Uuid); // (conversation_id, user_id)

struct TimerEntry {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
pub struct TypingCoordinator {
    registry: ConnectionRegistry,
    timeout: Duration,
    timers: Arc<Mutex<HashMap<TypingKey, TimerEntry>>>,
    next_generation: Arc<AtomicU64>,
}

impl TypingCoordinator {
    pub fn new(registry: ConnectionRegistry, timeout: Duration) -> Self {
        Self {
            registry,
            timeout,
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Set or refresh the expiry timer and broadcast the indicator.
    pub async fn start_typing(&self, conversation_id: Uuid, user_id: Uuid) {
        let key = (conversation_id, user_id);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let handle = self.spawn_expiry(key, generation);
        {
            let mut timers = self.timers.lock().await;
            if let Some(previous) = timers.insert(key, TimerEntry { generation, handle }) {
                previous.handle.abort();
            }
        }
        self.registry
            .broadcast(
                conversation_id,
                ServerEvent::TypingIndicator {
                    conversation_id,
                    user_id,
                    is_typing: true,
                },
                None,
            )
            .await;
    }

    /// Cancel the timer and broadcast `is_typing: false`. A stop with no
    /// active timer is a harmless no-op.
    pub async fn stop_typing(&self, conversation_id: Uuid, user_id: Uuid) {
        let removed = {
            let mut timers = self.timers.lock().await;
            timers.remove(&(conversation_id, user_id))
        };
        if let Some(entry) = removed {
            entry.handle.abort();
            self.registry
                .broadcast(
                    conversation_id,
                    ServerEvent::TypingIndicator {
                        conversation_id,
                        user_id,
                        is_typing: false,
                    },
                    None,
                )
                .await;
        }
    }

    pub async fn is_typing(&self, conversation_id: Uuid, user_id: Uuid) -> bool {
        let timers = self.timers.lock().await;
        timers.contains_key(&(conversation_id, user_id))
    }

    /// Abort all timers; no indicator fires after shutdown.
    pub async fn shutdown(&self) {
        let mut timers = self.timers.lock().await;
        for (_, entry) in timers.drain() {
            entry.handle.abort();
        }
    }

    // The generation check keeps a stale timer (superseded by a refresh
    // that raced the abort) from emitting a false stop.
    fn spawn_expiry(&self, key: TypingKey, generation: u64) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let timers = Arc::clone(&self.timers);
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let expired = {
                let mut guard = timers.lock().await;
                match guard.get(&key) {
                    Some(entry) if entry.generation == generation => {
                        guard.remove(&key);
                        true
                    }
                    _ => false,
                }
            };
            if expired {
                registry
                    .broadcast(
                        key.0,
                        ServerEvent::TypingIndicator {
                            conversation_id: key.0,
                            user_id: key.1,
                            is_typing: false,
                        },
                        None,
                    )
                    .await;
            }
        })
    }
}
