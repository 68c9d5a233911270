use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use tracing::{debug, instrument};

use super::types::{Claims, TokenType};
use crate::config::AuthConfig;

/// Verification failures, in the order the checks run. Parse and signature
/// errors come from the JWT library; expiry, type and claim-presence checks
/// are performed here.
#[derive(Error, Debug, PartialEq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("invalid token type: expected {expected}, got {actual}")]
    WrongTokenType {
        expected: TokenType,
        actual: TokenType,
    },

    #[error("missing required claims")]
    MissingClaims,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// A freshly signed token together with its expiry instant
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies the compact HS256 tokens used for both access and
/// refresh credentials. Timestamps are whole-second Unix epoch values.
#[derive(Clone)]
pub struct TokenCodec {
    secret: String,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            secret: config.secret.clone(),
            issuer: config.issuer.clone(),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Signs a token of the given type for the user/session pair
    #[instrument(skip(self, user_id, username, session_id))]
    pub fn issue(
        &self,
        user_id: &str,
        username: &str,
        session_id: &str,
        token_type: TokenType,
    ) -> Result<IssuedToken, TokenError> {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };

        let now = Utc::now();
        let expires_at = now + ttl;
        let claims = Claims {
            user_id: user_id.to_string(),
            username: username.to_string(),
            session_id: session_id.to_string(),
            token_type,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
        .map_err(|e| TokenError::Encoding(e.to_string()))?;

        debug!(%token_type, exp = claims.exp, "token issued");

        Ok(IssuedToken { token, expires_at })
    }

    /// Verifies a token against the current wall clock
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        self.verify_at(token, expected, Utc::now())
    }

    /// Verifies a token against an explicit instant.
    ///
    /// Expiry is enforced here rather than by the JWT library: a token whose
    /// `exp` equals the verification instant is already expired, while the
    /// library check allows leeway.
    pub fn verify_at(
        &self,
        token: &str,
        expected: TokenType,
        now: DateTime<Utc>,
    ) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed,
        })?;
        let claims = data.claims;

        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.token_type != expected {
            return Err(TokenError::WrongTokenType {
                expected,
                actual: claims.token_type,
            });
        }
        if claims.user_id.is_empty() || claims.username.is_empty() || claims.session_id.is_empty()
        {
            return Err(TokenError::MissingClaims);
        }

        Ok(claims)
    }
}
