/// Auth Service
///
/// Session lifecycle on top of the credential and token stores: registration,
/// login, refresh-token rotation, logout, password change, revocation and account deletion.
/// Passwords and raw refresh tokens are never logged.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::jwt::generate_access_token;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::refresh_token::{hash_token, issue_refresh_token};
use crate::clock::Clock;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, ConflictError};
use crate::store::{CredentialStore, TokenStore, User, UserProfile};

/// Access/refresh pair handed to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResult {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

/// Input of `AuthService::register`. The email is expected to be normalised.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub device_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Verified against when a login names no live account, so that path pays
/// the same bcrypt cost as a wrong password.
const DUMMY_PASSWORD: &str = "plantcare-dummy-password";

pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    tokens: Arc<dyn TokenStore>,
    jwt: JwtSettings,
    password_cost: u32,
    dummy_hash: String,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        tokens: Arc<dyn TokenStore>,
        jwt: JwtSettings,
        password_cost: u32,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let dummy_hash = bcrypt::hash(DUMMY_PASSWORD, password_cost).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to build the dummy password hash");
            String::new()
        });

        Self {
            credentials,
            tokens,
            jwt,
            password_cost,
            dummy_hash,
            clock,
        }
    }

    pub fn jwt_settings(&self) -> &JwtSettings {
        &self.jwt
    }

    /// Creates a user and opens a session on `device_id`.
    ///
    /// # Errors
    /// `Conflict(UserAlreadyExists)` if a live user already has this email
    pub async fn register(&self, new_user: NewUser) -> Result<AuthResult, AppError> {
        if self
            .credentials
            .find_active_by_email(&new_user.email)
            .await?
            .is_some()
        {
            tracing::info!("Registration rejected: email already in use");
            return Err(ConflictError::UserAlreadyExists.into());
        }

        let password_hash = hash_password(&new_user.password, self.password_cost)?;
        let now = self.clock.now();
        let user = User::new(
            new_user.email,
            password_hash,
            new_user.first_name,
            new_user.last_name,
            now,
        );

        // The store re-checks uniqueness, which covers concurrent registrations
        self.credentials.insert_user(&user).await?;
        let tokens = self.issue_tokens(&user, &new_user.device_id).await?;

        tracing::info!(user_id = %user.id, device_id = %new_user.device_id, "User registered");
        Ok(AuthResult {
            user: user.profile(),
            tokens,
        })
    }

    /// # Errors
    /// `InvalidCredentials` for an unknown email, a deleted account or a wrong
    /// password; the three cases are indistinguishable to the caller.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device_id: &str,
    ) -> Result<AuthResult, AppError> {
        let mut user = match self.credentials.find_active_by_email(email).await? {
            Some(user) => user,
            None => {
                let _ = verify_password(password, &self.dummy_hash);
                tracing::info!("Login failed: unknown email");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !verify_password(password, &user.password_hash)? {
            tracing::info!(user_id = %user.id, "Login failed: password mismatch");
            return Err(AuthError::InvalidCredentials.into());
        }

        let now = self.clock.now();
        self.credentials.record_login(user.id, now).await?;
        user.last_login_at = Some(now);
        let tokens = self.issue_tokens(&user, device_id).await?;

        tracing::info!(user_id = %user.id, device_id = %device_id, "User logged in");
        Ok(AuthResult {
            user: user.profile(),
            tokens,
        })
    }

    /// Exchanges a refresh token for a new pair on the same device.
    ///
    /// # Errors
    /// `InvalidRefreshToken` if the token is unknown, revoked, expired, or its
    /// owner no longer exists
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let token_hash = hash_token(refresh_token);
        let now = self.clock.now();

        let stored = match self.tokens.find_by_hash(&token_hash).await? {
            Some(token) if token.is_valid(now) => token,
            Some(token) => {
                tracing::warn!(
                    user_id = %token.user_id,
                    revoked = token.is_revoked(),
                    "Refresh with a dead token"
                );
                return Err(AuthError::InvalidRefreshToken.into());
            }
            None => {
                tracing::warn!("Refresh with an unknown token");
                return Err(AuthError::InvalidRefreshToken.into());
            }
        };

        let user = match self.credentials.find_active_by_id(stored.user_id).await? {
            Some(user) => user,
            None => {
                tracing::warn!(user_id = %stored.user_id, "Refresh for a missing user");
                return Err(AuthError::InvalidRefreshToken.into());
            }
        };

        let (refresh_token, record) =
            issue_refresh_token(user.id, &stored.device_id, now, self.jwt.refresh_token_expiry);

        // Lost a race with a concurrent refresh or revocation of the same token
        if !self.tokens.rotate(&token_hash, &record, now).await? {
            tracing::warn!(user_id = %user.id, "Refresh token was consumed concurrently");
            return Err(AuthError::InvalidRefreshToken.into());
        }

        tracing::info!(user_id = %user.id, device_id = %stored.device_id, "Tokens refreshed");
        self.token_pair(&user, refresh_token)
    }

    /// Revokes the token if it is live. Never fails.
    pub async fn logout(&self, refresh_token: &str) {
        let token_hash = hash_token(refresh_token);
        match self.tokens.revoke(&token_hash, self.clock.now()).await {
            Ok(true) => tracing::info!("Refresh token revoked on logout"),
            Ok(false) => tracing::info!("Logout with an unknown or revoked token"),
            Err(e) => tracing::error!(error = %e, "Logout failed to revoke token"),
        }
    }

    /// Replaces the password and ends every session of the user.
    ///
    /// Sessions are revoked before the hash is replaced: if either step
    /// fails the old password stays in force and no refresh token issued
    /// under it can outlive a successful change.
    ///
    /// # Errors
    /// - `InvalidCurrentPassword` if `current_password` does not match
    /// - `Unauthorized` if the user no longer exists
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let user = self.active_user(user_id).await?;

        if !verify_password(current_password, &user.password_hash)? {
            tracing::info!(user_id = %user_id, "Password change rejected: wrong current password");
            return Err(AuthError::InvalidCurrentPassword.into());
        }

        let password_hash = hash_password(new_password, self.password_cost)?;
        let now = self.clock.now();
        let revoked = self.tokens.revoke_all_for_user(user_id, now).await?;
        self.credentials
            .update_password(user_id, &password_hash, now)
            .await?;

        tracing::info!(user_id = %user_id, revoked, "Password changed");
        Ok(())
    }

    /// Soft-deletes the account and revokes its refresh tokens. The email
    /// becomes available for a new registration.
    ///
    /// # Errors
    /// `Unauthorized` if there is no live user with this id
    pub async fn delete_account(&self, user_id: Uuid) -> Result<(), AppError> {
        let now = self.clock.now();
        if !self.credentials.soft_delete(user_id, now).await? {
            return Err(AuthError::Unauthorized.into());
        }
        let revoked = self.tokens.revoke_all_for_user(user_id, now).await?;

        tracing::info!(user_id = %user_id, revoked, "Account deleted");
        Ok(())
    }

    /// Revokes every live refresh token of the user and returns the count.
    pub async fn revoke_all_tokens(&self, user_id: Uuid) -> Result<u64, AppError> {
        let revoked = self
            .tokens
            .revoke_all_for_user(user_id, self.clock.now())
            .await?;

        tracing::info!(user_id = %user_id, revoked, "All refresh tokens revoked");
        Ok(revoked)
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<UserProfile, AppError> {
        Ok(self.active_user(user_id).await?.profile())
    }

    async fn active_user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.credentials
            .find_active_by_id(user_id)
            .await?
            .ok_or(AppError::Auth(AuthError::Unauthorized))
    }

    async fn issue_tokens(&self, user: &User, device_id: &str) -> Result<TokenPair, AppError> {
        let (refresh_token, record) = issue_refresh_token(
            user.id,
            device_id,
            self.clock.now(),
            self.jwt.refresh_token_expiry,
        );
        self.tokens.insert(&record).await?;
        self.token_pair(user, refresh_token)
    }

    fn token_pair(&self, user: &User, refresh_token: String) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: generate_access_token(user, self.clock.now(), &self.jwt)?,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_token_expiry,
        })
    }
}
