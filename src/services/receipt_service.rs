//! Delivery/read state machine.
//!
//! One record per (message, reader) pair whose status advances
//! sent -> delivered -> read and never regresses. "Sent" is implicit: it
//! is the absence of a receipt. The check-then-act on the receipt row is
//! serialized behind one mutex; per-conversation sharding is the upgrade
//! path if this ever becomes a bottleneck.

use crate::error::{AppError, AppResult};
use crate::models::{Message, MessageReadReceipt, ReceiptStatus};
use crate::storage::{collections, Filter, RecordStore, Sort};
use crate::ws::events::ServerEvent;
use crate::ws::registry::ConnectionRegistry;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Clone)]
pub struct ReceiptService {
    store: Arc<dyn RecordStore>,
    registry: ConnectionRegistry,
    write_gate: Arc<Mutex<()>>,
}

impl ReceiptService {
    pub fn new(store: Arc<dyn RecordStore>, registry: ConnectionRegistry) -> Self {
        Self {
            store,
            registry,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    async fn load_message(&self, message_id: Uuid) -> AppResult<Message> {
        let value = self
            .store
            .get(collections::MESSAGES, message_id)
            .await?
            .ok_or(AppError::NotFound)?;
        serde_json::from_value(value).map_err(|e| AppError::Storage(format!("decode message: {e}")))
    }

    pub async fn find(
        &self,
        message_id: Uuid,
        reader_id: Uuid,
    ) -> AppResult<Option<MessageReadReceipt>> {
        let rows = self
            .store
            .list(
                collections::MESSAGE_READS,
                &Filter::new().eq("message_id", message_id).eq("reader_id", reader_id),
                Sort::Unsorted,
                Some(1),
                0,
            )
            .await?;
        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| AppError::Storage(format!("decode receipt: {e}"))),
            None => Ok(None),
        }
    }

    /// Transport receipt: the reader's client became aware of the message.
    /// Creates the Delivered record on first call; any later call (either
    /// status) is an idempotent no-op — never a downgrade, never a
    /// duplicate row.
    pub async fn mark_delivered(
        &self,
        message_id: Uuid,
        reader_id: Uuid,
    ) -> AppResult<MessageReadReceipt> {
        let message = self.load_message(message_id).await?;
        if message.sender_id == reader_id {
            return Err(AppError::BadRequest("reader must differ from sender".into()));
        }

        let receipt = {
            let _gate = self.write_gate.lock().await;
            if let Some(existing) = self.find(message_id, reader_id).await? {
                return Ok(existing);
            }
            let receipt =
                MessageReadReceipt::delivered(message_id, message.conversation_id, reader_id);
            let value =
                serde_json::to_value(&receipt).map_err(|e| AppError::Storage(e.to_string()))?;
            self.store.create(collections::MESSAGE_READS, value).await?;
            receipt
        };

        self.broadcast(&receipt).await;
        Ok(receipt)
    }

    /// The reader's client rendered the message. Upgrades a Delivered
    /// receipt in place (preserving `delivered_at`), creates a Read
    /// receipt directly when the delivered step was missed, and no-ops on
    /// an existing Read receipt.
    pub async fn mark_read(
        &self,
        message_id: Uuid,
        reader_id: Uuid,
    ) -> AppResult<MessageReadReceipt> {
        let message = self.load_message(message_id).await?;
        if message.sender_id == reader_id {
            return Err(AppError::BadRequest("reader must differ from sender".into()));
        }

        let receipt = {
            let _gate = self.write_gate.lock().await;
            match self.find(message_id, reader_id).await? {
                Some(existing) if existing.status == ReceiptStatus::Read => {
                    return Ok(existing);
                }
                Some(existing) => {
                    let now = Utc::now();
                    let patch = json!({ "status": ReceiptStatus::Read, "read_at": now });
                    let updated = self
                        .store
                        .update(collections::MESSAGE_READS, existing.id, patch)
                        .await?;
                    serde_json::from_value(updated)
                        .map_err(|e| AppError::Storage(format!("decode receipt: {e}")))?
                }
                None => {
                    let receipt =
                        MessageReadReceipt::read(message_id, message.conversation_id, reader_id);
                    let value = serde_json::to_value(&receipt)
                        .map_err(|e| AppError::Storage(e.to_string()))?;
                    self.store.create(collections::MESSAGE_READS, value).await?;
                    receipt
                }
            }
        };

        self.broadcast(&receipt).await;
        Ok(receipt)
    }

    /// All receipts for a conversation; what the client pollers consume.
    pub async fn list_for_conversation(
        &self,
        conversation_id: Uuid,
    ) -> AppResult<Vec<MessageReadReceipt>> {
        let rows = self
            .store
            .list(
                collections::MESSAGE_READS,
                &Filter::new().eq("conversation_id", conversation_id),
                Sort::Unsorted,
                None,
                0,
            )
            .await?;
        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| AppError::Storage(format!("decode receipt: {e}")))
            })
            .collect()
    }

    // Effective state changes broadcast so the sender's client updates
    // its checkmarks without re-polling; no-ops stay silent.
    async fn broadcast(&self, receipt: &MessageReadReceipt) {
        self.registry
            .broadcast(
                receipt.conversation_id,
                ServerEvent::ReceiptUpdated {
                    conversation_id: receipt.conversation_id,
                    message_id: receipt.message_id,
                    reader_id: receipt.reader_id,
                    status: receipt.status,
                    delivered_at: receipt.delivered_at,
                    read_at: receipt.read_at,
                },
                None,
            )
            .await;
    }
}
