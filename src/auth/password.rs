/// Password Hashing and Verification
///
/// Handles password hashing with bcrypt. The work factor comes from
/// `password.hash_cost`.

use bcrypt::{hash, verify};

use crate::error::{AppError, ValidationError};
use crate::validators::check_password_strength;

/// Hash a password using bcrypt
///
/// # Arguments
/// * `password` - Plain text password to hash
/// * `cost` - bcrypt work factor
///
/// # Errors
/// Returns error if:
/// - Password fails the strength rules
/// - Bcrypt hashing fails
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    check_password_strength(password)
        .map_err(|v| AppError::Validation(ValidationError::single("password", v.to_string())))?;

    hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
///
/// # Errors
/// Returns error if the stored hash is not a bcrypt hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}
