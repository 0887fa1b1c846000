use loadboard_chat_service::{
    auth::StaticTokenAuth, config::Config, error::AppError, logging, state::AppState,
    storage::InMemoryStore, ws,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();
    let config = Arc::new(Config::from_env()?);

    // The in-memory store backs local development; deployments wire the
    // marketplace data platform in behind the same trait.
    let store = Arc::new(InMemoryStore::new());
    let auth = match config.dev_tokens.as_deref() {
        Some(spec) => Arc::new(StaticTokenAuth::from_spec(spec)?),
        None => {
            tracing::warn!("CHAT_DEV_TOKENS not set; all connections will be rejected");
            Arc::new(StaticTokenAuth::default())
        }
    };

    let state = AppState::new(config.clone(), store, auth);
    let app = ws::handlers::router(state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(%bind_addr, "starting loadboard-chat-service");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::StartServer(e.to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::StartServer(e.to_string()))?;

    state.shutdown().await;
    Ok(())
}
