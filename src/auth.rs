//! Authentication collaborator. Validates a bearer credential on
//! connection establishment and yields a stable user id; token issuance
//! lives elsewhere.

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, token: &str) -> AppResult<Uuid>;
}

/// Static token table for development and tests.
#[derive(Default, Clone)]
pub struct StaticTokenAuth {
    tokens: HashMap<String, Uuid>,
}

impl StaticTokenAuth {
    pub fn new(tokens: HashMap<String, Uuid>) -> Self {
        Self { tokens }
    }

    pub fn single(token: impl Into<String>, user_id: Uuid) -> Self {
        let mut tokens = HashMap::new();
        tokens.insert(token.into(), user_id);
        Self { tokens }
    }

    /// Parses `token=user_id` pairs separated by commas, e.g.
    /// `CHAT_DEV_TOKENS="alpha=550e...,beta=661f..."`.
    pub fn from_spec(spec: &str) -> AppResult<Self> {
        let mut tokens = HashMap::new();
        for pair in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (token, user) = pair
                .split_once('=')
                .ok_or_else(|| AppError::Config(format!("invalid dev token entry: {pair}")))?;
            let user_id = Uuid::parse_str(user.trim())
                .map_err(|_| AppError::Config(format!("invalid user id in dev token: {pair}")))?;
            tokens.insert(token.trim().to_string(), user_id);
        }
        Ok(Self { tokens })
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuth {
    async fn authenticate(&self, token: &str) -> AppResult<Uuid> {
        self.tokens.get(token).copied().ok_or(AppError::Unauthorized)
    }
}
