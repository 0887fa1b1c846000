use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    General,
    Shipment,
    Support,
}

/// A durable two-party messaging thread. Never deleted, only
/// archived or closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub kind: ConversationKind,
    pub initiator_id: Uuid,
    pub receiver_id: Uuid,
    /// Set for shipment-linked threads.
    pub shipment_id: Option<Uuid>,
    pub is_active: bool,
    pub total_message_count: i64,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_preview: Option<String>,
    pub last_message_id: Option<Uuid>,
    pub archived_by: Vec<Uuid>,
    pub blocked_by: Vec<Uuid>,
    pub closed_reason: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(
        initiator_id: Uuid,
        receiver_id: Uuid,
        kind: ConversationKind,
        shipment_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            initiator_id,
            receiver_id,
            shipment_id,
            is_active: true,
            total_message_count: 0,
            last_message_at: None,
            last_message_preview: None,
            last_message_id: None,
            archived_by: Vec::new(),
            blocked_by: Vec::new(),
            closed_reason: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.initiator_id == user_id || self.receiver_id == user_id
    }

    pub fn other_participant(&self, user_id: Uuid) -> Option<Uuid> {
        if self.initiator_id == user_id {
            Some(self.receiver_id)
        } else if self.receiver_id == user_id {
            Some(self.initiator_id)
        } else {
            None
        }
    }

    pub fn is_archived_by(&self, user_id: Uuid) -> bool {
        self.archived_by.contains(&user_id)
    }

    /// Any participant block suspends new sends in both directions.
    pub fn is_blocked(&self) -> bool {
        !self.blocked_by.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_helpers() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let convo = Conversation::new(a, b, ConversationKind::Shipment, Some(Uuid::new_v4()));

        assert!(convo.is_participant(a));
        assert!(convo.is_participant(b));
        assert!(!convo.is_participant(Uuid::new_v4()));
        assert_eq!(convo.other_participant(a), Some(b));
        assert_eq!(convo.other_participant(b), Some(a));
        assert_eq!(convo.other_participant(Uuid::new_v4()), None);
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ConversationKind::Shipment).unwrap();
        assert_eq!(json, "\"shipment\"");
    }
}
