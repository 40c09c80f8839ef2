/// Persistence layer
///
/// `CredentialStore` owns user records and `TokenStore` owns refresh-token
/// records. Both have a Postgres implementation and an in-memory one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;

mod memory;
mod models;
mod postgres;

pub use memory::{InMemoryCredentialStore, InMemoryTokenStore};
pub use models::{RefreshToken, User, UserProfile, UserRole};
pub use postgres::{PgCredentialStore, PgTokenStore};

/// User records. Lookups only ever see non-deleted users.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persists a new user.
    ///
    /// # Errors
    /// `AppError::Conflict` if a non-deleted user already has this email
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;

    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Marks the user deleted. Returns `false` if there was no live user.
    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, AppError>;
}

/// Refresh-token records, keyed by token hash
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, token: &RefreshToken) -> Result<(), AppError>;

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, AppError>;

    /// Revokes `old_hash` and stores `replacement` as one atomic step.
    ///
    /// The revoke only applies if the old token is still valid at `now`;
    /// otherwise nothing is written and `false` is returned.
    async fn rotate(
        &self,
        old_hash: &str,
        replacement: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Revokes one token. Returns `false` if it was unknown or already revoked.
    async fn revoke(&self, token_hash: &str, at: DateTime<Utc>) -> Result<bool, AppError>;

    /// Revokes every live token of a user and returns how many were revoked.
    async fn revoke_all_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<u64, AppError>;
}
