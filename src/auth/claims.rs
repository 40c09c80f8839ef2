/// JWT Claims structure
///
/// Represents the payload of an access token containing user information
/// and standard JWT claims (RFC 7519).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::store::UserRole;

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// User email
    pub email: String,
    pub role: UserRole,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
}

impl Claims {
    /// Create new claims with user information
    ///
    /// # Arguments
    /// * `user_id` - User's UUID
    /// * `email` - User's email address
    /// * `role` - User's role
    /// * `issued_at` - Current time as read from the service clock
    /// * `expiry_seconds` - Token lifetime in seconds
    /// * `issuer` - Issuer identifier
    pub fn new(
        user_id: Uuid,
        email: String,
        role: UserRole,
        issued_at: DateTime<Utc>,
        expiry_seconds: i64,
        issuer: String,
    ) -> Self {
        let now = issued_at.timestamp();
        Self {
            sub: user_id.to_string(),
            email,
            role,
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// `TokenInvalid` if the subject is not a UUID
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Auth(AuthError::TokenInvalid))
    }
}
