use crate::{
    auth::AuthProvider,
    config::Config,
    presence::PresenceRegistry,
    services::{ConversationService, MessageService, ReceiptService},
    storage::RecordStore,
    typing::TypingCoordinator,
    ws::ConnectionRegistry,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn RecordStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub registry: ConnectionRegistry,
    pub presence: PresenceRegistry,
    pub typing: TypingCoordinator,
    pub conversations: ConversationService,
    pub messages: MessageService,
    pub receipts: ReceiptService,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn RecordStore>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        let registry = ConnectionRegistry::new();
        let presence = PresenceRegistry::new();
        let typing = TypingCoordinator::new(
            registry.clone(),
            Duration::from_millis(config.typing_timeout_ms),
        );
        let conversations = ConversationService::new(Arc::clone(&store));
        let messages = MessageService::new(
            Arc::clone(&store),
            registry.clone(),
            conversations.clone(),
        );
        let receipts = ReceiptService::new(Arc::clone(&store), registry.clone());

        Self {
            config,
            store,
            auth,
            registry,
            presence,
            typing,
            conversations,
            messages,
            receipts,
        }
    }

    /// Tear down timer-owning registries on shutdown.
    pub async fn shutdown(&self) {
        self.typing.shutdown().await;
    }
}
