pub mod conversation_service;
pub mod message_service;
pub mod receipt_service;

pub use conversation_service::ConversationService;
pub use message_service::MessageService;
pub use receipt_service::ReceiptService;
