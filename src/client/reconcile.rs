//! Polling fallback and status merge.
//!
//! Broadcasts are the fast path but a client that was offline, or whose
//! socket silently died, has gaps. Periodic polls repair them: receipt
//! rows are merged into the local cache by status rank
//! (read > delivered > none), so a stale poll response can never walk a
//! locally-known Read back to Delivered.

use crate::error::AppResult;
use crate::models::{status_rank, Conversation, MessageReadReceipt, ReceiptStatus};
use crate::services::{ConversationService, ReceiptService};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

/// What the sender's message bubble renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkmark {
    /// Persisted, no receipt yet.
    SingleGrey,
    /// Delivered to the counterparty's device.
    Single,
    /// Rendered on the counterparty's screen.
    Double,
}

/// Last-writer-wins on status rank; the local side wins ties. Returns the
/// winning receipt.
pub fn merge_receipts(
    local: Option<MessageReadReceipt>,
    remote: MessageReadReceipt,
) -> MessageReadReceipt {
    match local {
        Some(local) if status_rank(Some(local.status)) >= status_rank(Some(remote.status)) => local,
        _ => remote,
    }
}

/// Per-conversation receipt view on the sender's side. Two-party rooms
/// have exactly one counterparty reader, so keying by message is enough.
#[derive(Default)]
pub struct ReceiptCache {
    by_message: HashMap<Uuid, MessageReadReceipt>,
}

impl ReceiptCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one receipt (from a broadcast or a poll row) into the cache.
    /// Returns true when the effective status advanced.
    pub fn apply(&mut self, receipt: MessageReadReceipt) -> bool {
        let message_id = receipt.message_id;
        let before = self.by_message.get(&message_id).map(|r| r.status);
        let merged = merge_receipts(self.by_message.remove(&message_id), receipt);
        let changed = status_rank(before) < status_rank(Some(merged.status));
        self.by_message.insert(message_id, merged);
        changed
    }

    /// Merge a full poll response; returns how many messages advanced.
    pub fn apply_poll(&mut self, receipts: Vec<MessageReadReceipt>) -> usize {
        receipts.into_iter().filter(|r| self.apply(r.clone())).count()
    }

    pub fn status(&self, message_id: Uuid) -> Option<ReceiptStatus> {
        self.by_message.get(&message_id).map(|r| r.status)
    }

    pub fn get(&self, message_id: Uuid) -> Option<&MessageReadReceipt> {
        self.by_message.get(&message_id)
    }

    pub fn checkmark(&self, message_id: Uuid) -> Checkmark {
        match self.status(message_id) {
            None => Checkmark::SingleGrey,
            Some(ReceiptStatus::Delivered) => Checkmark::Single,
            Some(ReceiptStatus::Read) => Checkmark::Double,
        }
    }
}

/// One fetch-and-merge pass; returns how many messages advanced.
pub async fn poll_receipts_once(
    receipts: &ReceiptService,
    conversation_id: Uuid,
    cache: &mut ReceiptCache,
) -> AppResult<usize> {
    let rows = receipts.list_for_conversation(conversation_id).await?;
    Ok(cache.apply_poll(rows))
}

/// Background poller for one conversation's receipts. Poll failures are
/// logged and retried on the next tick; abort the handle to stop.
pub fn spawn_receipt_poller(
    receipts: ReceiptService,
    conversation_id: Uuid,
    interval: Duration,
    cache: Arc<Mutex<ReceiptCache>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let mut cache = cache.lock().await;
            if let Err(e) = poll_receipts_once(&receipts, conversation_id, &mut cache).await {
                warn!(%conversation_id, error = %e, "receipt poll failed");
            }
        }
    })
}

/// Conversation-list row as the inbox screen renders it.
#[derive(Debug, Clone)]
pub struct ConversationSnapshot {
    pub conversation: Conversation,
    pub unread_count: usize,
}

/// Refresh the inbox: active conversations with per-conversation unread
/// counts, newest activity first (the service already sorts).
pub async fn poll_conversations_once(
    conversations: &ConversationService,
    user_id: Uuid,
) -> AppResult<Vec<ConversationSnapshot>> {
    let listed = conversations.list_for_user(user_id).await?;
    let mut out = Vec::with_capacity(listed.len());
    for conversation in listed {
        let unread_count = conversations.unread_count(conversation.id, user_id).await?;
        out.push(ConversationSnapshot {
            conversation,
            unread_count,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(message_id: Uuid, status: ReceiptStatus) -> MessageReadReceipt {
        match status {
            ReceiptStatus::Delivered => {
                MessageReadReceipt::delivered(message_id, Uuid::new_v4(), Uuid::new_v4())
            }
            ReceiptStatus::Read => {
                MessageReadReceipt::read(message_id, Uuid::new_v4(), Uuid::new_v4())
            }
        }
    }

    #[test]
    fn test_merge_prefers_higher_rank() {
        let m = Uuid::new_v4();
        let local = receipt(m, ReceiptStatus::Read);
        let remote = receipt(m, ReceiptStatus::Delivered);
        let winner = merge_receipts(Some(local.clone()), remote);
        assert_eq!(winner.id, local.id);
        assert_eq!(winner.status, ReceiptStatus::Read);
    }

    #[test]
    fn test_merge_local_wins_ties() {
        let m = Uuid::new_v4();
        let local = receipt(m, ReceiptStatus::Delivered);
        let remote = receipt(m, ReceiptStatus::Delivered);
        assert_eq!(merge_receipts(Some(local.clone()), remote).id, local.id);
    }

    #[test]
    fn test_cache_never_regresses_read() {
        let m = Uuid::new_v4();
        let mut cache = ReceiptCache::new();
        assert!(cache.apply(receipt(m, ReceiptStatus::Read)));
        // stale poll row arriving late
        assert!(!cache.apply(receipt(m, ReceiptStatus::Delivered)));
        assert_eq!(cache.status(m), Some(ReceiptStatus::Read));
        assert_eq!(cache.checkmark(m), Checkmark::Double);
    }

    #[test]
    fn test_cache_advances_delivered_to_read() {
        let m = Uuid::new_v4();
        let mut cache = ReceiptCache::new();
        assert!(cache.apply(receipt(m, ReceiptStatus::Delivered)));
        assert_eq!(cache.checkmark(m), Checkmark::Single);
        assert!(cache.apply(receipt(m, ReceiptStatus::Read)));
        assert_eq!(cache.checkmark(m), Checkmark::Double);
    }

    #[test]
    fn test_unknown_message_is_single_grey() {
        let cache = ReceiptCache::new();
        assert_eq!(cache.checkmark(Uuid::new_v4()), Checkmark::SingleGrey);
    }

    #[test]
    fn test_apply_poll_counts_only_advances() {
        let m1 = Uuid::new_v4();
        let m2 = Uuid::new_v4();
        let mut cache = ReceiptCache::new();
        cache.apply(receipt(m1, ReceiptStatus::Read));
        let advanced = cache.apply_poll(vec![
            receipt(m1, ReceiptStatus::Delivered),
            receipt(m2, ReceiptStatus::Delivered),
        ]);
        assert_eq!(advanced, 1);
    }
}
