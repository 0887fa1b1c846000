//! Client-side reconciliation: the offline action queue, the polling
//! fallback that repairs missed broadcasts, and the typing debouncer.
//! Everything here is transport-agnostic so it can sit behind a real
//! socket or be driven directly in tests.

pub mod offline_queue;
pub mod reconcile;

pub use offline_queue::{ActionSink, OfflineQueue, QueuedAction};
pub use reconcile::{merge_receipts, Checkmark, ReceiptCache};

use crate::error::AppResult;
use crate::state::AppState;
use crate::ws::registry::ConnectionId;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// In-process sink applying queued actions against the relay services;
/// the reconnect flush path uses this directly.
pub struct SessionSink {
    pub state: AppState,
    pub user_id: Uuid,
    pub connection_id: Option<ConnectionId>,
}

#[async_trait]
impl ActionSink for SessionSink {
    async fn apply(&self, action: &QueuedAction) -> AppResult<()> {
        match action {
            QueuedAction::SendMessage {
                conversation_id,
                message_id,
                content,
                kind,
            } => {
                self.state
                    .messages
                    .send(
                        *conversation_id,
                        self.user_id,
                        content.clone(),
                        *kind,
                        Some(*message_id),
                        self.connection_id,
                    )
                    .await?;
                Ok(())
            }
            QueuedAction::MarkDelivered { message_id } => {
                self.state
                    .receipts
                    .mark_delivered(*message_id, self.user_id)
                    .await?;
                Ok(())
            }
            QueuedAction::MarkRead { message_id } => {
                self.state.receipts.mark_read(*message_id, self.user_id).await?;
                Ok(())
            }
            QueuedAction::TypingStart { conversation_id } => {
                self.state
                    .typing
                    .start_typing(*conversation_id, self.user_id)
                    .await;
                Ok(())
            }
            QueuedAction::TypingStop { conversation_id } => {
                self.state
                    .typing
                    .stop_typing(*conversation_id, self.user_id)
                    .await;
                Ok(())
            }
        }
    }
}

/// Rate-limits `typing.start` signals on the client side. Expiry stays
/// server-owned; this only keeps the wire quiet while the user types.
pub struct TypingDebouncer {
    debounce: Duration,
    last_sent: Option<Instant>,
}

impl TypingDebouncer {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            last_sent: None,
        }
    }

    /// True when a `typing.start` should actually be sent now.
    pub fn should_send(&mut self, now: Instant) -> bool {
        match self.last_sent {
            Some(last) if now.duration_since(last) < self.debounce => false,
            _ => {
                self.last_sent = Some(now);
                true
            }
        }
    }

    /// Explicit stop resets the window so the next keystroke signals
    /// immediately.
    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}
