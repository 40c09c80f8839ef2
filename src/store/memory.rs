//! In-memory stores
//!
//! Each store keeps its records behind one `RwLock`, so every trait method is
//! atomic with respect to the others.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{RefreshToken, User};
use super::{CredentialStore, TokenStore};
use crate::error::{AppError, ConflictError, DatabaseError};

#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let mut users = self.users.write().await;

        let taken = users
            .values()
            .any(|u| !u.is_deleted() && u.email == user.email);
        if taken {
            return Err(AppError::Conflict(ConflictError::UserAlreadyExists));
        }

        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| !u.is_deleted() && u.email == email)
            .cloned())
    }

    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users.get(&id).filter(|u| !u.is_deleted()).cloned())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut users = self.users.write().await;
        if let Some(user) = users.get_mut(&id) {
            user.last_login_at = Some(at);
            user.updated_at = at;
        }
        Ok(())
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .filter(|u| !u.is_deleted())
            .ok_or_else(|| AppError::Database(DatabaseError::UnexpectedError(
                format!("no live user {}", id),
            )))?;

        user.password_hash = password_hash.to_string();
        user.password_changed_at = Some(at);
        user.updated_at = at;
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, AppError> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) if !user.is_deleted() => {
                user.deleted_at = Some(at);
                user.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryTokenStore {
    tokens: Arc<RwLock<HashMap<String, RefreshToken>>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn insert(&self, token: &RefreshToken) -> Result<(), AppError> {
        let mut tokens = self.tokens.write().await;

        if tokens.contains_key(&token.token_hash) {
            return Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
                "refresh_tokens_token_hash_key".to_string(),
            )));
        }

        tokens.insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, AppError> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(token_hash).cloned())
    }

    async fn rotate(
        &self,
        old_hash: &str,
        replacement: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tokens = self.tokens.write().await;

        if tokens.contains_key(&replacement.token_hash) {
            return Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
                "refresh_tokens_token_hash_key".to_string(),
            )));
        }

        match tokens.get_mut(old_hash) {
            Some(old) if old.is_valid(now) => old.revoke(now),
            _ => return Ok(false),
        }

        tokens.insert(replacement.token_hash.clone(), replacement.clone());
        Ok(true)
    }

    async fn revoke(&self, token_hash: &str, at: DateTime<Utc>) -> Result<bool, AppError> {
        let mut tokens = self.tokens.write().await;
        match tokens.get_mut(token_hash) {
            Some(token) if !token.is_revoked() => {
                token.revoke(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<u64, AppError> {
        let mut tokens = self.tokens.write().await;
        let mut count = 0;

        for token in tokens.values_mut() {
            if token.user_id == user_id && token.is_valid(at) {
                token.revoke(at);
                count += 1;
            }
        }

        Ok(count)
    }
}
