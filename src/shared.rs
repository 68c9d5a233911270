use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::auth::service::AuthService;
use crate::auth::token::TokenError;
use crate::todo::service::TodoService;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub todos: Arc<TodoService>,
}

impl AppState {
    pub fn new(auth: Arc<AuthService>, todos: Arc<TodoService>) -> Self {
        Self { auth, todos }
    }
}

/// Application error taxonomy. Credential failures are deliberately
/// collapsed: a caller cannot tell a missing user from a wrong password,
/// nor a malformed refresh token from an expired one.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("username already exists")]
    DuplicateUsername,

    #[error("email already exists")]
    DuplicateEmail,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("invalid session")]
    InvalidSession,

    #[error("session expired")]
    SessionExpired,

    #[error("failed to get user")]
    UserLookupFailed,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("session store unavailable: {0}")]
    SessionStoreUnavailable(String),

    #[error("user store unavailable: {0}")]
    UserStoreUnavailable(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::DuplicateUsername | AppError::DuplicateEmail => StatusCode::CONFLICT,
            AppError::InvalidCredentials
            | AppError::InvalidRefreshToken
            | AppError::InvalidSession
            | AppError::SessionExpired
            | AppError::Token(_)
            | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::UserLookupFailed | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::SessionStoreUnavailable(_)
            | AppError::UserStoreUnavailable(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn test_app_error_display() {
        assert_eq!(
            AppError::InvalidCredentials.to_string(),
            "invalid credentials"
        );
        assert_eq!(
            AppError::InvalidRefreshToken.to_string(),
            "invalid refresh token"
        );
        assert_eq!(AppError::SessionExpired.to_string(), "session expired");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            AppError::DuplicateUsername.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::InvalidCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::SessionExpired.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::NotFound("todo not found".to_string())
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Validation("title is required".to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::SessionStoreUnavailable("connection refused".to_string())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_token_error_maps_to_unauthorized() {
        let err: AppError = crate::auth::token::TokenError::Expired.into();
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
