use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Server-side typing expiry. Authoritative over the client debounce.
    pub typing_timeout_ms: u64,
    /// Client-side rate limit for `typing.start` signals.
    pub client_typing_debounce_ms: u64,
    pub poll_conversations_ms: u64,
    pub poll_receipts_ms: u64,
    /// `token=user_id` pairs for the static dev auth provider.
    pub dev_tokens: Option<String>,
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let typing_timeout_ms = env_u64("TYPING_TIMEOUT_MS", 5_000);
        let client_typing_debounce_ms = env_u64("CLIENT_TYPING_DEBOUNCE_MS", 3_000);
        if client_typing_debounce_ms > typing_timeout_ms {
            return Err(crate::error::AppError::Config(
                "CLIENT_TYPING_DEBOUNCE_MS must not exceed TYPING_TIMEOUT_MS".into(),
            ));
        }

        Ok(Self {
            port,
            typing_timeout_ms,
            client_typing_debounce_ms,
            poll_conversations_ms: env_u64("POLL_CONVERSATIONS_MS", 3_000),
            poll_receipts_ms: env_u64("POLL_RECEIPTS_MS", 2_000),
            dev_tokens: env::var("CHAT_DEV_TOKENS").ok(),
        })
    }

    pub fn test_defaults() -> Self {
        Self {
            port: 8080,
            typing_timeout_ms: 5_000,
            client_typing_debounce_ms: 3_000,
            poll_conversations_ms: 3_000,
            poll_receipts_ms: 2_000,
            dev_tokens: None,
        }
    }
}
