use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::models::User;
use crate::shared::AppError;

/// Trait for user credential storage
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<User, AppError>;
    async fn get_by_id(&self, id: &str) -> Result<Option<User>, AppError>;
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn exists_by_username(&self, username: &str) -> Result<bool, AppError>;
    async fn exists_by_email(&self, email: &str) -> Result<bool, AppError>;
}

/// In-memory implementation of UserRepository for development and testing
///
/// Enforces the same username/email uniqueness the database schema does.
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<String, User>>,
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the current number of users in the repository
    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    #[instrument(skip(self, user))]
    async fn create(&self, user: &User) -> Result<User, AppError> {
        let mut users = self.users.lock().unwrap();

        if users.values().any(|u| u.username == user.username) {
            warn!(username = %user.username, "username already taken");
            return Err(AppError::DuplicateUsername);
        }
        if let Some(email) = &user.email {
            if users.values().any(|u| u.email.as_deref() == Some(email)) {
                warn!("email already taken");
                return Err(AppError::DuplicateEmail);
            }
        }

        users.insert(user.id.clone(), user.clone());
        debug!(user_id = %user.id, username = %user.username, "user created in memory");
        Ok(user.clone())
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        let users = self.users.lock().unwrap();
        Ok(users.get(id).cloned())
    }

    #[instrument(skip(self))]
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let users = self.users.lock().unwrap();
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    #[instrument(skip(self))]
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users = self.users.lock().unwrap();
        Ok(users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, AppError> {
        Ok(self.get_by_username(username).await?.is_some())
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, AppError> {
        Ok(self.get_by_email(email).await?.is_some())
    }
}

/// PostgreSQL implementation of the user repository
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        image: row.get("image"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[instrument(skip(self, user))]
    async fn create(&self, user: &User) -> Result<User, AppError> {
        debug!(user_id = %user.id, username = %user.username, "creating user in database");

        sqlx::query(
            "INSERT INTO users (id, username, email, image, password_hash, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.image)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                match db.constraint() {
                    Some(constraint) if constraint.contains("email") => AppError::DuplicateEmail,
                    _ => AppError::DuplicateUsername,
                }
            }
            _ => {
                warn!(error = %e, "failed to create user in database");
                AppError::UserStoreUnavailable(format!("failed to create user: {e}"))
            }
        })?;

        debug!(user_id = %user.id, "user created in database");
        Ok(user.clone())
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            "SELECT id, username, email, image, password_hash, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, user_id = %id, "failed to fetch user by id");
            AppError::UserStoreUnavailable(format!("failed to get user: {e}"))
        })?;

        Ok(row.as_ref().map(row_to_user))
    }

    #[instrument(skip(self))]
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            "SELECT id, username, email, image, password_hash, created_at, updated_at \
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "failed to fetch user by username");
            AppError::UserStoreUnavailable(format!("failed to get user: {e}"))
        })?;

        Ok(row.as_ref().map(row_to_user))
    }

    #[instrument(skip(self))]
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            "SELECT id, username, email, image, password_hash, created_at, updated_at \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "failed to fetch user by email");
            AppError::UserStoreUnavailable(format!("failed to get user: {e}"))
        })?;

        Ok(row.as_ref().map(row_to_user))
    }

    #[instrument(skip(self))]
    async fn exists_by_username(&self, username: &str) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "failed to check username existence");
                AppError::UserStoreUnavailable(format!("failed to check username: {e}"))
            })?;

        Ok(row.get(0))
    }

    #[instrument(skip(self))]
    async fn exists_by_email(&self, email: &str) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "failed to check email existence");
                AppError::UserStoreUnavailable(format!("failed to check email: {e}"))
            })?;

        Ok(row.get(0))
    }
}
