use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::store::{Session, SessionStore};
use super::token::{TokenCodec, TokenError};
use super::types::{
    AuthUserResponse, Claims, LoginByEmailRequest, LoginRequest, LoginResponse, LogoutRequest,
    LogoutResponse, RefreshTokenRequest, RefreshTokenResponse, RegisterRequest, RegisterResponse,
    TokenType,
};
use crate::config::AuthConfig;
use crate::shared::AppError;
use crate::user::models::User;
use crate::user::repository::UserRepository;

/// Orchestrates credential verification, token issuance and the session
/// lifecycle. Holds no per-instance mutable state, so a single instance is
/// shared by all request tasks without locking.
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionStore>,
    tokens: TokenCodec,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionStore>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            users,
            sessions,
            tokens: TokenCodec::new(config),
            bcrypt_cost: config.bcrypt_cost,
        }
    }

    /// Creates a new user account. Registration issues no tokens and
    /// creates no session; login is a separate step.
    #[instrument(skip(self, req))]
    pub async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, AppError> {
        if self.users.exists_by_username(&req.username).await? {
            return Err(AppError::DuplicateUsername);
        }
        if let Some(email) = &req.email {
            if self.users.exists_by_email(email).await? {
                return Err(AppError::DuplicateEmail);
            }
        }

        let password_hash = self.hash_password(req.password).await?;
        let user = User::new(req.username, req.email, req.image, password_hash);
        let created = self.users.create(&user).await?;

        info!(user_id = %created.id, username = %created.username, "user registered");

        Ok(RegisterResponse {
            user: created.to_response(),
            message: "User registered successfully".to_string(),
        })
    }

    /// Authenticates by username and opens a new session
    #[instrument(skip(self, req))]
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AppError> {
        // An unknown username and a failed lookup both collapse into the
        // same error as a wrong password, so callers cannot enumerate
        // accounts.
        let user = match self.users.get_by_username(&req.username).await {
            Ok(Some(user)) => user,
            Ok(None) | Err(_) => {
                warn!("login rejected: unknown username");
                return Err(AppError::InvalidCredentials);
            }
        };

        self.open_session(user, req.password).await
    }

    /// Authenticates by email and opens a new session
    #[instrument(skip(self, req))]
    pub async fn login_by_email(&self, req: LoginByEmailRequest) -> Result<LoginResponse, AppError> {
        let user = match self.users.get_by_email(&req.email).await {
            Ok(Some(user)) => user,
            Ok(None) | Err(_) => {
                warn!("login rejected: unknown email");
                return Err(AppError::InvalidCredentials);
            }
        };

        self.open_session(user, req.password).await
    }

    /// Mints a new access token from a refresh token, provided the backing
    /// session is still live. The refresh token itself is not rotated.
    #[instrument(skip(self, req))]
    pub async fn refresh_token(
        &self,
        req: RefreshTokenRequest,
    ) -> Result<RefreshTokenResponse, AppError> {
        let claims = self
            .tokens
            .verify(&req.refresh_token, TokenType::Refresh)
            .map_err(|e| {
                warn!(error = %e, "refresh token rejected");
                AppError::InvalidRefreshToken
            })?;

        let session = match self.sessions.get(&claims.session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                warn!(session_id = %claims.session_id, "session not found");
                return Err(AppError::InvalidSession);
            }
            Err(e) => {
                warn!(session_id = %claims.session_id, error = %e, "session lookup failed");
                return Err(AppError::InvalidSession);
            }
        };

        if !session.is_active || session.is_expired() {
            warn!(session_id = %claims.session_id, "session inactive or expired");
            return Err(AppError::SessionExpired);
        }

        let access = self.tokens.issue(
            &claims.user_id,
            &claims.username,
            &claims.session_id,
            TokenType::Access,
        )?;

        info!(user_id = %claims.user_id, session_id = %claims.session_id, "access token refreshed");

        Ok(RefreshTokenResponse {
            access_token: access.token,
            expires_at: access.expires_at,
        })
    }

    /// Best-effort session teardown: a missing, malformed or already
    /// consumed refresh token never fails the caller.
    #[instrument(skip(self, req))]
    pub async fn logout(&self, req: LogoutRequest) -> Result<LogoutResponse, AppError> {
        if let Some(refresh_token) = &req.refresh_token {
            if let Ok(claims) = self.tokens.verify(refresh_token, TokenType::Refresh) {
                match self.sessions.delete(&claims.session_id).await {
                    Ok(()) => {
                        info!(user_id = %claims.user_id, session_id = %claims.session_id, "user logged out");
                    }
                    Err(e) => {
                        warn!(session_id = %claims.session_id, error = %e, "session delete on logout failed");
                    }
                }
            }
        }

        Ok(LogoutResponse {
            message: "Logged out successfully".to_string(),
        })
    }

    /// Returns the sanitized user for an authenticated user id
    #[instrument(skip(self))]
    pub async fn get_authenticated_user(&self, user_id: &str) -> Result<AuthUserResponse, AppError> {
        match self.users.get_by_id(user_id).await {
            Ok(Some(user)) => Ok(AuthUserResponse {
                user: user.to_response(),
            }),
            Ok(None) => Err(AppError::UserLookupFailed),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "failed to get authenticated user");
                Err(AppError::UserLookupFailed)
            }
        }
    }

    /// Verifies an access token by signature and expiry alone. The session
    /// store is not consulted: a logged-out access token stays valid until
    /// its own short expiry, which is why the access TTL is kept small.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.tokens.verify(token, TokenType::Access)
    }

    async fn open_session(&self, user: User, password: String) -> Result<LoginResponse, AppError> {
        if !self
            .verify_password(user.password_hash.clone(), password)
            .await?
        {
            warn!(user_id = %user.id, "invalid password attempt");
            return Err(AppError::InvalidCredentials);
        }

        let session = Session::new(&user.id, self.tokens.refresh_ttl());
        let access = self
            .tokens
            .issue(&user.id, &user.username, &session.id, TokenType::Access)?;
        let refresh = self
            .tokens
            .issue(&user.id, &user.username, &session.id, TokenType::Refresh)?;

        // The store write is the only mutation; a failed login leaves no
        // session behind.
        let ttl = self
            .tokens
            .refresh_ttl()
            .to_std()
            .map_err(|e| AppError::Internal(format!("invalid refresh ttl: {e}")))?;
        self.sessions.set(&session, ttl).await?;

        info!(user_id = %user.id, session_id = %session.id, "user logged in");

        Ok(LoginResponse {
            access_token: access.token,
            refresh_token: refresh.token,
            expires_at: access.expires_at,
            user: user.to_response(),
        })
    }

    // bcrypt is intentionally CPU-expensive; both hash and verify run on
    // the blocking pool so request tasks stay responsive.
    async fn hash_password(&self, password: String) -> Result<String, AppError> {
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AppError::Internal(format!("hash task failed: {e}")))?
            .map_err(|e| AppError::Internal(format!("failed to hash password: {e}")))
    }

    async fn verify_password(&self, hash: String, password: String) -> Result<bool, AppError> {
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
            .await
            .map_err(|e| AppError::Internal(format!("verify task failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::InMemorySessionStore;
    use crate::shared::test_utils::{insert_expired_session, test_auth_config};
    use crate::user::repository::InMemoryUserRepository;

    struct TestHarness {
        service: AuthService,
        sessions: Arc<InMemorySessionStore>,
        codec: TokenCodec,
    }

    fn harness() -> TestHarness {
        let config = test_auth_config();
        let users = Arc::new(InMemoryUserRepository::new());
        let sessions = Arc::new(InMemorySessionStore::new());
        TestHarness {
            service: AuthService::new(users, sessions.clone(), &config),
            sessions,
            codec: TokenCodec::new(&config),
        }
    }

    fn register_request(username: &str, email: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: "pw123456".to_string(),
            email: email.map(|e| e.to_string()),
            image: None,
        }
    }

    async fn register_and_login(harness: &TestHarness, username: &str) -> LoginResponse {
        harness
            .service
            .register(register_request(username, None))
            .await
            .unwrap();
        harness
            .service
            .login(LoginRequest {
                username: username.to_string(),
                password: "pw123456".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_returns_sanitized_user_and_no_tokens() {
        let h = harness();

        let response = h
            .service
            .register(register_request("alice", Some("alice@example.com")))
            .await
            .unwrap();

        assert_eq!(response.user.username, "alice");
        assert_eq!(response.user.email.as_deref(), Some("alice@example.com"));
        assert_eq!(response.message, "User registered successfully");

        // Registration opens no session.
        assert_eq!(h.sessions.session_count(), 0);
    }

    #[tokio::test]
    async fn test_register_duplicate_username_fails_regardless_of_email() {
        let h = harness();
        h.service
            .register(register_request("alice", Some("alice@example.com")))
            .await
            .unwrap();

        let result = h
            .service
            .register(register_request("alice", Some("other@example.com")))
            .await;
        assert!(matches!(result.unwrap_err(), AppError::DuplicateUsername));
    }

    #[tokio::test]
    async fn test_register_duplicate_email_fails() {
        let h = harness();
        h.service
            .register(register_request("alice", Some("alice@example.com")))
            .await
            .unwrap();

        let result = h
            .service
            .register(register_request("bob", Some("alice@example.com")))
            .await;
        assert!(matches!(result.unwrap_err(), AppError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_login_returns_two_distinct_tokens_and_a_session() {
        let h = harness();
        let login = register_and_login(&h, "alice").await;

        assert!(!login.access_token.is_empty());
        assert!(!login.refresh_token.is_empty());
        assert_ne!(login.access_token, login.refresh_token);
        assert_eq!(login.user.username, "alice");
        assert_eq!(h.sessions.session_count(), 1);

        // Both tokens reference the same session.
        let access = h
            .codec
            .verify(&login.access_token, TokenType::Access)
            .unwrap();
        let refresh = h
            .codec
            .verify(&login.refresh_token, TokenType::Refresh)
            .unwrap();
        assert_eq!(access.session_id, refresh.session_id);
        assert_eq!(access.user_id, refresh.user_id);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_are_indistinguishable() {
        let h = harness();
        h.service
            .register(register_request("alice", None))
            .await
            .unwrap();

        let wrong_password = h
            .service
            .login(LoginRequest {
                username: "alice".to_string(),
                password: "wrong-password".to_string(),
            })
            .await
            .unwrap_err();
        let unknown_user = h
            .service
            .login(LoginRequest {
                username: "nobody".to_string(),
                password: "pw123456".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_user, AppError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());

        // Failed logins open no session.
        assert_eq!(h.sessions.session_count(), 0);
    }

    #[tokio::test]
    async fn test_login_by_email() {
        let h = harness();
        h.service
            .register(register_request("alice", Some("alice@example.com")))
            .await
            .unwrap();

        let login = h
            .service
            .login_by_email(LoginByEmailRequest {
                email: "alice@example.com".to_string(),
                password: "pw123456".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(login.user.username, "alice");

        let unknown = h
            .service
            .login_by_email(LoginByEmailRequest {
                email: "nobody@example.com".to_string(),
                password: "pw123456".to_string(),
            })
            .await;
        assert!(matches!(unknown.unwrap_err(), AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_validate_access_token_round_trip() {
        let h = harness();
        let login = register_and_login(&h, "alice").await;

        let claims = h.service.validate_access_token(&login.access_token).unwrap();
        assert_eq!(claims.username, "alice");
        assert!(!claims.user_id.is_empty());
        assert!(!claims.session_id.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_token_presented_as_access_token_fails() {
        let h = harness();
        let login = register_and_login(&h, "alice").await;

        let result = h.service.validate_access_token(&login.refresh_token);
        assert!(matches!(
            result.unwrap_err(),
            TokenError::WrongTokenType { .. }
        ));
    }

    #[tokio::test]
    async fn test_refresh_issues_new_access_token_without_rotating_refresh() {
        let h = harness();
        let login = register_and_login(&h, "alice").await;

        let refreshed = h
            .service
            .refresh_token(RefreshTokenRequest {
                refresh_token: login.refresh_token.clone(),
            })
            .await
            .unwrap();

        let original = h.service.validate_access_token(&login.access_token).unwrap();
        let minted = h
            .service
            .validate_access_token(&refreshed.access_token)
            .unwrap();
        assert_eq!(original.session_id, minted.session_id);
        assert_eq!(original.user_id, minted.user_id);

        // The same refresh token keeps working.
        assert!(h
            .service
            .refresh_token(RefreshTokenRequest {
                refresh_token: login.refresh_token,
            })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_refresh_with_garbage_token_fails() {
        let h = harness();
        let result = h
            .service
            .refresh_token(RefreshTokenRequest {
                refresh_token: "not.a.token".to_string(),
            })
            .await;
        assert!(matches!(result.unwrap_err(), AppError::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn test_refresh_with_access_token_fails() {
        let h = harness();
        let login = register_and_login(&h, "alice").await;

        let result = h
            .service
            .refresh_token(RefreshTokenRequest {
                refresh_token: login.access_token,
            })
            .await;
        assert!(matches!(result.unwrap_err(), AppError::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn test_refresh_after_logout_fails_with_invalid_session() {
        let h = harness();
        let login = register_and_login(&h, "alice").await;

        h.service
            .logout(LogoutRequest {
                refresh_token: Some(login.refresh_token.clone()),
            })
            .await
            .unwrap();

        let result = h
            .service
            .refresh_token(RefreshTokenRequest {
                refresh_token: login.refresh_token,
            })
            .await;
        assert!(matches!(result.unwrap_err(), AppError::InvalidSession));
    }

    #[tokio::test]
    async fn test_refresh_against_expired_session_fails() {
        let h = harness();

        // The store entry is retrievable but the session itself has lapsed.
        let session = insert_expired_session(h.sessions.as_ref(), "user-1").await;
        let refresh = h
            .codec
            .issue("user-1", "alice", &session.id, TokenType::Refresh)
            .unwrap();

        let result = h
            .service
            .refresh_token(RefreshTokenRequest {
                refresh_token: refresh.token,
            })
            .await;
        assert!(matches!(result.unwrap_err(), AppError::SessionExpired));
    }

    #[tokio::test]
    async fn test_refresh_against_inactive_session_fails() {
        let h = harness();
        let mut session = Session::new("user-1", chrono::Duration::hours(1));
        session.is_active = false;
        h.sessions
            .set(&session, std::time::Duration::from_secs(3600))
            .await
            .unwrap();

        let refresh = h
            .codec
            .issue("user-1", "alice", &session.id, TokenType::Refresh)
            .unwrap();
        let result = h
            .service
            .refresh_token(RefreshTokenRequest {
                refresh_token: refresh.token,
            })
            .await;
        assert!(matches!(result.unwrap_err(), AppError::SessionExpired));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let h = harness();
        let login = register_and_login(&h, "alice").await;

        let first = h
            .service
            .logout(LogoutRequest {
                refresh_token: Some(login.refresh_token.clone()),
            })
            .await
            .unwrap();
        assert_eq!(first.message, "Logged out successfully");

        // The session is gone, but a second logout with the consumed token
        // still reports success.
        let second = h
            .service
            .logout(LogoutRequest {
                refresh_token: Some(login.refresh_token),
            })
            .await
            .unwrap();
        assert_eq!(second.message, "Logged out successfully");
    }

    #[tokio::test]
    async fn test_logout_without_token_and_with_garbage_token_succeed() {
        let h = harness();

        assert!(h
            .service
            .logout(LogoutRequest {
                refresh_token: None,
            })
            .await
            .is_ok());
        assert!(h
            .service
            .logout(LogoutRequest {
                refresh_token: Some("garbage".to_string()),
            })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_logout_does_not_invalidate_outstanding_access_tokens() {
        let h = harness();
        let login = register_and_login(&h, "alice").await;

        h.service
            .logout(LogoutRequest {
                refresh_token: Some(login.refresh_token),
            })
            .await
            .unwrap();

        // Access validation is store-free, so the token survives logout
        // until its own expiry.
        assert!(h.service.validate_access_token(&login.access_token).is_ok());
    }

    #[tokio::test]
    async fn test_get_authenticated_user() {
        let h = harness();
        let login = register_and_login(&h, "alice").await;

        let found = h
            .service
            .get_authenticated_user(&login.user.id)
            .await
            .unwrap();
        assert_eq!(found.user.username, "alice");

        let missing = h.service.get_authenticated_user("missing-id").await;
        assert!(matches!(missing.unwrap_err(), AppError::UserLookupFailed));
    }

    #[tokio::test]
    async fn test_concurrent_logins_create_independent_sessions() {
        let h = harness();
        let first = register_and_login(&h, "alice").await;
        let second = h
            .service
            .login(LoginRequest {
                username: "alice".to_string(),
                password: "pw123456".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(h.sessions.session_count(), 2);

        // Logging out one session leaves the other refreshable.
        h.service
            .logout(LogoutRequest {
                refresh_token: Some(first.refresh_token.clone()),
            })
            .await
            .unwrap();

        assert!(h
            .service
            .refresh_token(RefreshTokenRequest {
                refresh_token: second.refresh_token,
            })
            .await
            .is_ok());
        assert!(h
            .service
            .refresh_token(RefreshTokenRequest {
                refresh_token: first.refresh_token,
            })
            .await
            .is_err());
    }
}
