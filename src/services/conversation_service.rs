use crate::error::{AppError, AppResult};
use crate::models::{Conversation, ConversationKind, Message, MessageReadReceipt, ReceiptStatus};
use crate::storage::{collections, Filter, RecordStore, Sort};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct ConversationService {
    store: Arc<dyn RecordStore>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    fn decode(value: serde_json::Value) -> AppResult<Conversation> {
        serde_json::from_value(value).map_err(|e| AppError::Storage(format!("decode conversation: {e}")))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Conversation> {
        let value = self
            .store
            .get(collections::CONVERSATIONS, id)
            .await?
            .ok_or(AppError::NotFound)?;
        Self::decode(value)
    }

    pub async fn require_participant(&self, id: Uuid, user_id: Uuid) -> AppResult<Conversation> {
        let conversation = self.get(id).await?;
        if !conversation.is_participant(user_id) {
            return Err(AppError::Forbidden);
        }
        Ok(conversation)
    }

    /// Create a conversation between two parties, or return the existing
    /// active one for the same pair, kind, and shipment link.
    pub async fn open(
        &self,
        initiator_id: Uuid,
        receiver_id: Uuid,
        kind: ConversationKind,
        shipment_id: Option<Uuid>,
    ) -> AppResult<Conversation> {
        if initiator_id == receiver_id {
            return Err(AppError::BadRequest(
                "cannot open a conversation with yourself".into(),
            ));
        }

        for (a, b) in [(initiator_id, receiver_id), (receiver_id, initiator_id)] {
            let rows = self
                .store
                .list(
                    collections::CONVERSATIONS,
                    &Filter::new().eq("initiator_id", a).eq("receiver_id", b),
                    Sort::Unsorted,
                    None,
                    0,
                )
                .await?;
            for row in rows {
                let existing = Self::decode(row)?;
                if existing.is_active
                    && existing.kind == kind
                    && existing.shipment_id == shipment_id
                {
                    return Ok(existing);
                }
            }
        }

        let conversation = Conversation::new(initiator_id, receiver_id, kind, shipment_id);
        let value = serde_json::to_value(&conversation)
            .map_err(|e| AppError::Storage(e.to_string()))?;
        let stored = self.store.create(collections::CONVERSATIONS, value).await?;
        Self::decode(stored)
    }

    /// All conversations the user participates in and has not archived,
    /// most recently active first.
    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Conversation>> {
        let mut out = Vec::new();
        for field in ["initiator_id", "receiver_id"] {
            let rows = self
                .store
                .list(
                    collections::CONVERSATIONS,
                    &Filter::new().eq(field, user_id),
                    Sort::Unsorted,
                    None,
                    0,
                )
                .await?;
            for row in rows {
                let conversation = Self::decode(row)?;
                if !conversation.is_archived_by(user_id) {
                    out.push(conversation);
                }
            }
        }
        out.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(out)
    }

    /// Denormalized counters, refreshed on every accepted message.
    pub async fn bump_counters(
        &self,
        conversation: &Conversation,
        message: &Message,
    ) -> AppResult<Conversation> {
        let patch = json!({
            "total_message_count": conversation.total_message_count + 1,
            "last_message_at": message.created_at,
            "last_message_preview": message.preview(),
            "last_message_id": message.id,
            "updated_at": Utc::now(),
        });
        let updated = self
            .store
            .update(collections::CONVERSATIONS, conversation.id, patch)
            .await?;
        Self::decode(updated)
    }

    pub async fn archive(&self, id: Uuid, user_id: Uuid) -> AppResult<Conversation> {
        let mut conversation = self.require_participant(id, user_id).await?;
        if !conversation.archived_by.contains(&user_id) {
            conversation.archived_by.push(user_id);
        }
        self.patch_flags(&conversation).await
    }

    pub async fn unarchive(&self, id: Uuid, user_id: Uuid) -> AppResult<Conversation> {
        let mut conversation = self.require_participant(id, user_id).await?;
        conversation.archived_by.retain(|u| *u != user_id);
        self.patch_flags(&conversation).await
    }

    pub async fn block(&self, id: Uuid, user_id: Uuid) -> AppResult<Conversation> {
        let mut conversation = self.require_participant(id, user_id).await?;
        if !conversation.blocked_by.contains(&user_id) {
            conversation.blocked_by.push(user_id);
        }
        self.patch_flags(&conversation).await
    }

    pub async fn unblock(&self, id: Uuid, user_id: Uuid) -> AppResult<Conversation> {
        let mut conversation = self.require_participant(id, user_id).await?;
        conversation.blocked_by.retain(|u| *u != user_id);
        self.patch_flags(&conversation).await
    }

    async fn patch_flags(&self, conversation: &Conversation) -> AppResult<Conversation> {
        let patch = json!({
            "archived_by": conversation.archived_by,
            "blocked_by": conversation.blocked_by,
            "updated_at": Utc::now(),
        });
        let updated = self
            .store
            .update(collections::CONVERSATIONS, conversation.id, patch)
            .await?;
        Self::decode(updated)
    }

    /// Conversations are never deleted; closing deactivates them.
    pub async fn close(&self, id: Uuid, user_id: Uuid, reason: &str) -> AppResult<Conversation> {
        self.require_participant(id, user_id).await?;
        let now = Utc::now();
        let patch = json!({
            "is_active": false,
            "closed_reason": reason,
            "closed_at": now,
            "updated_at": now,
        });
        let updated = self.store.update(collections::CONVERSATIONS, id, patch).await?;
        Self::decode(updated)
    }

    /// Messages from the other party the user has not read yet.
    pub async fn unread_count(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<usize> {
        self.require_participant(conversation_id, user_id).await?;

        let receipts = self
            .store
            .list(
                collections::MESSAGE_READS,
                &Filter::new()
                    .eq("conversation_id", conversation_id)
                    .eq("reader_id", user_id),
                Sort::Unsorted,
                None,
                0,
            )
            .await?;
        let read_ids: std::collections::HashSet<Uuid> = receipts
            .into_iter()
            .filter_map(|row| serde_json::from_value::<MessageReadReceipt>(row).ok())
            .filter(|r| r.status == ReceiptStatus::Read)
            .map(|r| r.message_id)
            .collect();

        let messages = self
            .store
            .list(
                collections::MESSAGES,
                &Filter::new().eq("conversation_id", conversation_id),
                Sort::Unsorted,
                None,
                0,
            )
            .await?;
        let unread = messages
            .into_iter()
            .filter_map(|row| serde_json::from_value::<Message>(row).ok())
            .filter(|m| m.sender_id != user_id && !m.is_deleted() && !read_ids.contains(&m.id))
            .count();
        Ok(unread)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    fn service() -> ConversationService {
        ConversationService::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_open_reuses_active_conversation_either_order() {
        let svc = service();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let first = svc.open(a, b, ConversationKind::General, None).await.unwrap();
        let second = svc.open(b, a, ConversationKind::General, None).await.unwrap();
        assert_eq!(first.id, second.id);

        // different kind opens a new thread
        let support = svc.open(a, b, ConversationKind::Support, None).await.unwrap();
        assert_ne!(first.id, support.id);
    }

    #[tokio::test]
    async fn test_open_rejects_self_conversation() {
        let svc = service();
        let a = Uuid::new_v4();
        assert!(matches!(
            svc.open(a, a, ConversationKind::General, None).await.unwrap_err(),
            AppError::BadRequest(_)
        ));
    }

    #[tokio::test]
    async fn test_close_keeps_record_but_deactivates() {
        let svc = service();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let convo = svc.open(a, b, ConversationKind::General, None).await.unwrap();

        let closed = svc.close(convo.id, a, "shipment completed").await.unwrap();
        assert!(!closed.is_active);
        assert_eq!(closed.closed_reason.as_deref(), Some("shipment completed"));
        assert!(closed.closed_at.is_some());
        assert!(svc.get(convo.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_archive_hides_from_listing_for_that_user_only() {
        let svc = service();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let convo = svc.open(a, b, ConversationKind::General, None).await.unwrap();

        svc.archive(convo.id, a).await.unwrap();
        assert!(svc.list_for_user(a).await.unwrap().is_empty());
        assert_eq!(svc.list_for_user(b).await.unwrap().len(), 1);

        svc.unarchive(convo.id, a).await.unwrap();
        assert_eq!(svc.list_for_user(a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_block_flags_round_trip() {
        let svc = service();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let convo = svc.open(a, b, ConversationKind::General, None).await.unwrap();

        let blocked = svc.block(convo.id, b).await.unwrap();
        assert!(blocked.is_blocked());
        let unblocked = svc.unblock(convo.id, b).await.unwrap();
        assert!(!unblocked.is_blocked());
    }

    #[tokio::test]
    async fn test_require_participant_rejects_strangers() {
        let svc = service();
        let convo = svc
            .open(Uuid::new_v4(), Uuid::new_v4(), ConversationKind::General, None)
            .await
            .unwrap();
        assert!(matches!(
            svc.require_participant(convo.id, Uuid::new_v4()).await.unwrap_err(),
            AppError::Forbidden
        ));
    }
}
