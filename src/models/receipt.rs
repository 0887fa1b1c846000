use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery progress for one (message, reader) pair. A message with no
/// receipt for a reader is implicitly "sent".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Delivered,
    Read,
}

impl ReceiptStatus {
    /// Merge rank: read > delivered > none (none is rank 0).
    pub fn rank(self) -> u8 {
        match self {
            ReceiptStatus::Delivered => 1,
            ReceiptStatus::Read => 2,
        }
    }
}

/// The per-(message, reader) state machine record.
///
/// Invariant: at most one receipt exists per (message_id, reader_id), and
/// status only ever advances (delivered -> read).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReadReceipt {
    pub id: Uuid,
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    pub reader_id: Uuid,
    pub status: ReceiptStatus,
    pub delivered_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl MessageReadReceipt {
    pub fn delivered(message_id: Uuid, conversation_id: Uuid, reader_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            message_id,
            conversation_id,
            reader_id,
            status: ReceiptStatus::Delivered,
            delivered_at: Utc::now(),
            read_at: None,
        }
    }

    /// Reading implies delivery even when the delivered step was missed.
    pub fn read(message_id: Uuid, conversation_id: Uuid, reader_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            message_id,
            conversation_id,
            reader_id,
            status: ReceiptStatus::Read,
            delivered_at: now,
            read_at: Some(now),
        }
    }
}

pub fn status_rank(status: Option<ReceiptStatus>) -> u8 {
    status.map(ReceiptStatus::rank).unwrap_or(0)
}
