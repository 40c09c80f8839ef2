//! Postgres-backed stores
//!
//! Schema lives in `migrations/`. Queries are checked at runtime so the crate
//! builds without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::models::{RefreshToken, User, UserRole};
use super::{CredentialStore, TokenStore};
use crate::error::{AppError, ConflictError, DatabaseError};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, is_verified, \
     last_login_at, password_changed_at, created_at, updated_at, deleted_at";

const TOKEN_COLUMNS: &str = "id, user_id, token_hash, device_id, issued_at, expires_at, revoked_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    first_name: Option<String>,
    last_name: Option<String>,
    role: String,
    is_verified: bool,
    last_login_at: Option<DateTime<Utc>>,
    password_changed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<UserRole>()
            .map_err(|e| AppError::Database(DatabaseError::QueryExecution(e)))?;

        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            role,
            is_verified: row.is_verified,
            last_login_at: row.last_login_at,
            password_changed_at: row.password_changed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: Uuid,
    user_id: Uuid,
    token_hash: String,
    device_id: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl From<TokenRow> for RefreshToken {
    fn from(row: TokenRow) -> Self {
        RefreshToken {
            id: row.id,
            user_id: row.user_id,
            token_hash: row.token_hash,
            device_id: row.device_id,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
        }
    }
}

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, role,
                               is_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(user.is_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await;

        match result.map_err(AppError::from) {
            Ok(_) => Ok(()),
            // Partial unique index on lower(email) among live users
            Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_))) => {
                Err(AppError::Conflict(ConflictError::UserAlreadyExists))
            }
            Err(e) => Err(e),
        }
    }

    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE lower(email) = lower($1) AND deleted_at IS NULL",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login_at = $1, updated_at = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, password_changed_at = $2, updated_at = $2
            WHERE id = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(password_hash)
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Database(DatabaseError::UnexpectedError(format!(
                "no live user {}",
                id
            ))));
        }
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = $1, updated_at = $1 WHERE id = $2 AND deleted_at IS NULL",
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert(&self, token: &RefreshToken) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, device_id, issued_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(&token.device_id)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, AppError> {
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {} FROM refresh_tokens WHERE token_hash = $1",
            TOKEN_COLUMNS
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RefreshToken::from))
    }

    async fn rotate(
        &self,
        old_hash: &str,
        replacement: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;
        lock_owner(&mut tx, replacement.user_id).await?;

        // Row-level lock on the old token: a concurrent rotation blocks here and
        // then sees revoked_at set, so it updates nothing.
        let revoked = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $1
            WHERE token_hash = $2 AND revoked_at IS NULL AND expires_at > $1
            "#,
        )
        .bind(now)
        .bind(old_hash)
        .execute(&mut tx)
        .await?;

        if revoked.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, device_id, issued_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(replacement.id)
        .bind(replacement.user_id)
        .bind(&replacement.token_hash)
        .bind(&replacement.device_id)
        .bind(replacement.issued_at)
        .bind(replacement.expires_at)
        .execute(&mut tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn revoke(&self, token_hash: &str, at: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $1 WHERE token_hash = $2 AND revoked_at IS NULL",
        )
        .bind(at)
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        // Waits for in-flight rotations of this user, so their replacements
        // are committed and visible to the UPDATE below.
        lock_owner(&mut tx, user_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $1
            WHERE user_id = $2 AND revoked_at IS NULL AND expires_at > $1
            "#,
        )
        .bind(at)
        .bind(user_id)
        .execute(&mut tx)
        .await?;
        tx.commit().await?;

        tracing::info!(user_id = %user_id, revoked = result.rows_affected(), "Refresh tokens revoked for user");
        Ok(result.rows_affected())
    }
}

/// Takes the row lock on the token owner. Rotation and bulk revocation of the
/// same user serialise on it.
async fn lock_owner(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
    Ok(())
}
