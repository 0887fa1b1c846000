//! Offline send queue: while the transport is down, outbound actions
//! accumulate in order; on reconnect they flush in that order. Every
//! action is idempotent against the server contracts, so replaying one
//! that already landed is a no-op rather than an error.

use crate::error::AppResult;
use crate::models::MessageKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum QueuedAction {
    /// `message_id` is generated at enqueue time so a retry after a
    /// half-applied flush cannot double-insert.
    SendMessage {
        conversation_id: Uuid,
        message_id: Uuid,
        content: String,
        kind: MessageKind,
    },
    MarkDelivered {
        message_id: Uuid,
    },
    MarkRead {
        message_id: Uuid,
    },
    TypingStart {
        conversation_id: Uuid,
    },
    TypingStop {
        conversation_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct QueuedEntry {
    pub seq: u64,
    pub queued_at: DateTime<Utc>,
    pub action: QueuedAction,
}

#[async_trait]
pub trait ActionSink: Send + Sync {
    async fn apply(&self, action: &QueuedAction) -> AppResult<()>;
}

#[derive(Default)]
pub struct OfflineQueue {
    next_seq: u64,
    entries: VecDeque<QueuedEntry>,
}

impl OfflineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, action: QueuedAction) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(QueuedEntry {
            seq,
            queued_at: Utc::now(),
            action,
        });
        seq
    }

    pub fn enqueue_send(
        &mut self,
        conversation_id: Uuid,
        content: String,
        kind: MessageKind,
    ) -> (u64, Uuid) {
        let message_id = Uuid::new_v4();
        let seq = self.enqueue(QueuedAction::SendMessage {
            conversation_id,
            message_id,
            content,
            kind,
        });
        (seq, message_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &QueuedEntry> {
        self.entries.iter()
    }

    /// Flush in original order. On failure the failing entry and
    /// everything behind it stay queued for the next reconnect; the
    /// error is returned to the caller.
    pub async fn flush<S: ActionSink + ?Sized>(&mut self, sink: &S) -> AppResult<usize> {
        let mut applied = 0;
        loop {
            let Some(entry) = self.entries.front() else { break };
            sink.apply(&entry.action).await?;
            self.entries.pop_front();
            applied += 1;
        }
        Ok(applied)
    }
}
