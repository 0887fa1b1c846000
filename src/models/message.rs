use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
    Location,
    System,
}

/// A prior revision of an edited message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditRevision {
    pub content: String,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub kind: MessageKind,
    pub edit_count: i32,
    pub edit_history: Vec<EditRevision>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_reason: Option<String>,
    pub deleted_by: Option<Uuid>,
    pub attachment_count: i32,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(conversation_id: Uuid, sender_id: Uuid, content: String, kind: MessageKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            content,
            kind,
            edit_count: 0,
            edit_history: Vec::new(),
            edited_at: None,
            deleted_at: None,
            deleted_reason: None,
            deleted_by: None,
            attachment_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Preview text for the conversation list (denormalized onto the
    /// conversation on every accepted message).
    pub fn preview(&self) -> String {
        self.content.chars().take(120).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_defaults_to_text() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(default)]
            kind: MessageKind,
        }
        let p: Probe = serde_json::from_str("{}").unwrap();
        assert_eq!(p.kind, MessageKind::Text);
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "к".repeat(300);
        let msg = Message::new(Uuid::new_v4(), Uuid::new_v4(), long, MessageKind::Text);
        assert_eq!(msg.preview().chars().count(), 120);
    }
}
