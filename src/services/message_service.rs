//! Message relay: validate, persist through the storage collaborator,
//! then broadcast. A message that failed to persist is never broadcast.

use crate::error::{AppError, AppResult};
use crate::models::{Message, MessageKind};
use crate::services::conversation_service::ConversationService;
use crate::storage::{collections, Filter, RecordStore, Sort};
use crate::ws::events::ServerEvent;
use crate::ws::registry::{ConnectionId, ConnectionRegistry};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct MessageService {
    store: Arc<dyn RecordStore>,
    registry: ConnectionRegistry,
    conversations: ConversationService,
}

impl MessageService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        registry: ConnectionRegistry,
        conversations: ConversationService,
    ) -> Self {
        Self {
            store,
            registry,
            conversations,
        }
    }

    fn decode(value: serde_json::Value) -> AppResult<Message> {
        serde_json::from_value(value).map_err(|e| AppError::Storage(format!("decode message: {e}")))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Message> {
        let value = self
            .store
            .get(collections::MESSAGES, id)
            .await?
            .ok_or(AppError::NotFound)?;
        Self::decode(value)
    }

    /// Accept a message: validate, persist, bump conversation counters,
    /// broadcast to the room excluding the sender's own connection (the
    /// sender already holds the authoritative copy from this call).
    ///
    /// `message_id` is the optional client-generated id; a replay with an
    /// id that already exists returns the stored message and broadcasts
    /// nothing.
    pub async fn send(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: String,
        kind: MessageKind,
        message_id: Option<Uuid>,
        origin: Option<ConnectionId>,
    ) -> AppResult<Message> {
        if content.trim().is_empty() {
            return Err(AppError::BadRequest("message content cannot be empty".into()));
        }

        let conversation = self
            .conversations
            .require_participant(conversation_id, sender_id)
            .await?;
        if !conversation.is_active {
            return Err(AppError::ConversationClosed);
        }
        if conversation.is_blocked() {
            return Err(AppError::ConversationBlocked);
        }

        if let Some(id) = message_id {
            if let Some(existing) = self.store.get(collections::MESSAGES, id).await? {
                return Self::decode(existing);
            }
        }

        let mut message = Message::new(conversation_id, sender_id, content, kind);
        if let Some(id) = message_id {
            message.id = id;
        }

        let value = serde_json::to_value(&message).map_err(|e| AppError::Storage(e.to_string()))?;
        let stored = self.store.create(collections::MESSAGES, value).await?;
        let message = Self::decode(stored)?;

        // Counters are a denormalized cache; a failed bump does not undo
        // the committed message.
        if let Err(e) = self.conversations.bump_counters(&conversation, &message).await {
            tracing::warn!(%conversation_id, error = %e, "failed to update conversation counters");
        }

        self.registry
            .broadcast(
                conversation_id,
                ServerEvent::MessageNew {
                    message: message.clone(),
                },
                origin,
            )
            .await;
        Ok(message)
    }

    /// Only the original sender edits; prior content is kept in the edit
    /// history. Rejected edits broadcast nothing.
    pub async fn edit(
        &self,
        message_id: Uuid,
        editor_id: Uuid,
        new_content: String,
        origin: Option<ConnectionId>,
    ) -> AppResult<Message> {
        if new_content.trim().is_empty() {
            return Err(AppError::BadRequest("message content cannot be empty".into()));
        }
        let message = self.get(message_id).await?;
        if message.sender_id != editor_id {
            return Err(AppError::Forbidden);
        }
        if message.is_deleted() {
            return Err(AppError::AlreadyDeleted);
        }

        let now = Utc::now();
        let mut history = message.edit_history.clone();
        history.push(crate::models::EditRevision {
            content: message.content.clone(),
            edited_at: now,
        });

        let patch = json!({
            "content": new_content,
            "edited_at": now,
            "edit_count": message.edit_count + 1,
            "edit_history": history,
        });
        let updated = self.store.update(collections::MESSAGES, message_id, patch).await?;
        let message = Self::decode(updated)?;

        self.registry
            .broadcast(
                message.conversation_id,
                ServerEvent::MessageEdited {
                    message: message.clone(),
                },
                origin,
            )
            .await;
        Ok(message)
    }

    /// Soft delete by the sender, or by moderation with `moderation`
    /// set. Deleting an already-deleted message is a no-op.
    pub async fn delete(
        &self,
        message_id: Uuid,
        actor_id: Uuid,
        reason: Option<String>,
        moderation: bool,
        origin: Option<ConnectionId>,
    ) -> AppResult<Message> {
        let message = self.get(message_id).await?;
        if !moderation && message.sender_id != actor_id {
            return Err(AppError::Forbidden);
        }
        if message.is_deleted() {
            return Ok(message);
        }

        let patch = json!({
            "deleted_at": Utc::now(),
            "deleted_reason": reason,
            "deleted_by": actor_id,
        });
        let updated = self.store.update(collections::MESSAGES, message_id, patch).await?;
        let message = Self::decode(updated)?;

        self.registry
            .broadcast(
                message.conversation_id,
                ServerEvent::MessageDeleted {
                    conversation_id: message.conversation_id,
                    message_id: message.id,
                    deleted_by: actor_id,
                },
                origin,
            )
            .await;
        Ok(message)
    }

    /// Conversation history in send order. Soft-deleted messages keep
    /// their marker but lose their content.
    pub async fn history(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<Message>> {
        self.conversations
            .require_participant(conversation_id, user_id)
            .await?;
        let limit = limit.min(200);

        let rows = self
            .store
            .list(
                collections::MESSAGES,
                &Filter::new().eq("conversation_id", conversation_id),
                Sort::Asc("created_at"),
                Some(limit),
                offset,
            )
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut message = Self::decode(row)?;
            if message.is_deleted() {
                message.content = String::new();
                message.edit_history.clear();
            }
            out.push(message);
        }
        Ok(out)
    }
}
