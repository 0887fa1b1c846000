//! WebSocket event surface.
//!
//! All events are JSON objects tagged with a `"type"` field following the
//! `object.action` naming convention. Client events trigger relay
//! operations; server events are fanned out room-scoped (or globally for
//! presence changes).

use crate::models::{Message, MessageKind, ReceiptStatus};
use crate::presence::PresenceStatus;
use crate::ws::registry::ConnectionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "conversation.join")]
    ConversationJoin { conversation_id: Uuid },

    #[serde(rename = "conversation.leave")]
    ConversationLeave { conversation_id: Uuid },

    /// `message_id` is optional and client-generated; supplying it makes
    /// offline-queue retries idempotent.
    #[serde(rename = "message.send")]
    MessageSend {
        conversation_id: Uuid,
        #[serde(default)]
        message_id: Option<Uuid>,
        content: String,
        #[serde(default)]
        kind: MessageKind,
    },

    #[serde(rename = "message.edit")]
    MessageEdit { message_id: Uuid, content: String },

    #[serde(rename = "message.delete")]
    MessageDelete {
        message_id: Uuid,
        #[serde(default)]
        reason: Option<String>,
    },

    #[serde(rename = "typing.start")]
    TypingStart { conversation_id: Uuid },

    #[serde(rename = "typing.stop")]
    TypingStop { conversation_id: Uuid },

    #[serde(rename = "message.delivered")]
    MessageDelivered {
        conversation_id: Uuid,
        message_id: Uuid,
    },

    #[serde(rename = "message.read")]
    MessageRead {
        conversation_id: Uuid,
        message_id: Uuid,
    },

    /// Bulk-join the rooms for the client's active conversations after
    /// (re)connecting.
    #[serde(rename = "presence.online")]
    PresenceOnline { conversation_ids: Vec<Uuid> },

    /// Client going to background: leave all rooms but keep the
    /// connection (presence stays tied to connection liveness).
    #[serde(rename = "presence.offline")]
    PresenceOffline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// First event on every connection, before anything else is delivered.
    #[serde(rename = "connection.established")]
    ConnectionEstablished {
        connection_id: ConnectionId,
        user_id: Uuid,
    },

    #[serde(rename = "message.new")]
    MessageNew { message: Message },

    #[serde(rename = "message.edited")]
    MessageEdited { message: Message },

    #[serde(rename = "message.deleted")]
    MessageDeleted {
        conversation_id: Uuid,
        message_id: Uuid,
        deleted_by: Uuid,
    },

    #[serde(rename = "typing.indicator")]
    TypingIndicator {
        conversation_id: Uuid,
        user_id: Uuid,
        is_typing: bool,
    },

    #[serde(rename = "receipt.updated")]
    ReceiptUpdated {
        conversation_id: Uuid,
        message_id: Uuid,
        reader_id: Uuid,
        status: ReceiptStatus,
        delivered_at: DateTime<Utc>,
        read_at: Option<DateTime<Utc>>,
    },

    #[serde(rename = "presence.changed")]
    PresenceChanged {
        user_id: Uuid,
        status: PresenceStatus,
        timestamp: DateTime<Utc>,
    },

    /// Typed rejection, delivered only to the offending connection.
    #[serde(rename = "error")]
    Error { reason: String },
}

impl ServerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished { .. } => "connection.established",
            Self::MessageNew { .. } => "message.new",
            Self::MessageEdited { .. } => "message.edited",
            Self::MessageDeleted { .. } => "message.deleted",
            Self::TypingIndicator { .. } => "typing.indicator",
            Self::ReceiptUpdated { .. } => "receipt.updated",
            Self::PresenceChanged { .. } => "presence.changed",
            Self::Error { .. } => "error",
        }
    }
}
