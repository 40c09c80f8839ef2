/// JWT Token Generation and Validation
///
/// Access tokens are HS256 JWTs signed with `jwt.secret`.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::store::User;

/// Generate a new access token for a user
///
/// # Arguments
/// * `user` - Token subject
/// * `issued_at` - Current time as read from the service clock
/// * `config` - JWT configuration settings
///
/// # Errors
/// Returns error if token generation fails
pub fn generate_access_token(
    user: &User,
    issued_at: DateTime<Utc>,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let claims = Claims::new(
        user.id,
        user.email.clone(),
        user.role,
        issued_at,
        config.access_token_expiry,
        config.issuer.clone(),
    );

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Validate and extract claims from an access token
///
/// # Errors
/// `AuthError::TokenInvalid` if the token is malformed, expired, tampered
/// with or issued by someone else
pub fn validate_access_token(token: &str, config: &JwtSettings) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Verify issuer matches configuration
    validation.set_issuer(&[&config.issuer]);
    validation.leeway = 0;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("JWT validation error: {}", e);
        AppError::Auth(AuthError::TokenInvalid)
    })
}
