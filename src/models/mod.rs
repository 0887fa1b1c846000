pub mod conversation;
pub mod message;
pub mod receipt;

pub use conversation::{Conversation, ConversationKind};
pub use message::{EditRevision, Message, MessageKind};
pub use receipt::{status_rank, MessageReadReceipt, ReceiptStatus};
