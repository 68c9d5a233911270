use axum::{extract::State, Extension, Json};
use tracing::instrument;

use super::types::{
    AuthUserResponse, Claims, LoginByEmailRequest, LoginRequest, LoginResponse, LogoutRequest,
    LogoutResponse, RefreshTokenRequest, RefreshTokenResponse, RegisterRequest, RegisterResponse,
};
use crate::shared::{AppError, AppState};

/// POST /api/v1/auth/register
#[instrument(name = "register", skip(state, req))]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    if req.username.len() < 3 || req.username.len() > 50 {
        return Err(AppError::Validation(
            "username must be 3-50 characters".to_string(),
        ));
    }
    if req.password.len() < 6 {
        return Err(AppError::Validation(
            "password must be at least 6 characters".to_string(),
        ));
    }

    Ok(Json(state.auth.register(req).await?))
}

/// POST /api/v1/auth/login
#[instrument(name = "login", skip(state, req))]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    Ok(Json(state.auth.login(req).await?))
}

/// POST /api/v1/auth/login/email
#[instrument(name = "login_by_email", skip(state, req))]
pub async fn login_by_email(
    State(state): State<AppState>,
    Json(req): Json<LoginByEmailRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    Ok(Json(state.auth.login_by_email(req).await?))
}

/// POST /api/v1/auth/refresh
#[instrument(name = "refresh_token", skip(state, req))]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<RefreshTokenResponse>, AppError> {
    Ok(Json(state.auth.refresh_token(req).await?))
}

/// POST /api/v1/auth/logout
#[instrument(name = "logout", skip(state, req))]
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> Result<Json<LogoutResponse>, AppError> {
    Ok(Json(state.auth.logout(req).await?))
}

/// GET /api/v1/auth/me
///
/// Requires the bearer-auth middleware, which injects the validated claims.
#[instrument(name = "me", skip(state, claims))]
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<AuthUserResponse>, AppError> {
    Ok(Json(state.auth.get_authenticated_user(&claims.user_id).await?))
}
