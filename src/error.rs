use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("conversation closed")]
    ConversationClosed,

    #[error("conversation blocked")]
    ConversationBlocked,

    #[error("message already deleted")]
    AlreadyDeleted,
}

impl AppError {
    /// Returns whether this error is retryable (e.g., a storage outage).
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Storage(_))
    }

    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Unauthorized => 401,
            AppError::Forbidden | AppError::ConversationBlocked => 403,
            AppError::NotFound => 404,
            AppError::ConversationClosed | AppError::AlreadyDeleted => 410, // 410 Gone
            AppError::Storage(_) => 500,
            _ => 500,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(AppError::Unauthorized.status_code(), 401);
        assert_eq!(AppError::Forbidden.status_code(), 403);
        assert_eq!(AppError::NotFound.status_code(), 404);
        assert_eq!(AppError::ConversationClosed.status_code(), 410);
        assert_eq!(AppError::Storage("down".into()).status_code(), 500);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AppError::Storage("timeout".into()).is_retryable());
        assert!(!AppError::BadRequest("empty".into()).is_retryable());
        assert!(!AppError::ConversationBlocked.is_retryable());
    }
}
