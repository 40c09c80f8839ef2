/// Refresh Token Management
///
/// Refresh tokens are:
/// - Cryptographically secure random 64-character strings
/// - Hashed with SHA-256 before storage (the plaintext only lives on the client)
/// - Bound to the device that obtained them
/// - Single-use: every refresh revokes the presented token (rotation)

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::store::RefreshToken;

const REFRESH_TOKEN_LENGTH: usize = 64;

/// Generate a new cryptographically secure refresh token
///
/// The token is returned in plaintext (this is what the client stores).
pub fn generate_refresh_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// SHA-256 hex digest of a token; the only form the stores ever see
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Mints a token for `device_id` and the record to persist for it.
///
/// Returns `(plaintext, record)`.
pub fn issue_refresh_token(
    user_id: Uuid,
    device_id: &str,
    issued_at: DateTime<Utc>,
    expiry_seconds: i64,
) -> (String, RefreshToken) {
    let token = generate_refresh_token();
    let record = RefreshToken::new(
        user_id,
        hash_token(&token),
        device_id.to_string(),
        issued_at,
        Duration::seconds(expiry_seconds),
    );
    (token, record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_refresh_token() {
        let token = generate_refresh_token();

        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_token_hashing() {
        let token = generate_refresh_token();
        let hash1 = hash_token(&token);
        let hash2 = hash_token(&token);

        assert_eq!(hash1, hash2);
        assert_ne!(token, hash1);
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash1, hash_token(&generate_refresh_token()));
    }

    #[test]
    fn test_issue_refresh_token() {
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let (token, record) = issue_refresh_token(user_id, "d1", now, 604_800);

        assert_eq!(record.token_hash, hash_token(&token));
        assert_eq!(record.user_id, user_id);
        assert_eq!(record.device_id, "d1");
        assert_eq!(record.expires_at, now + Duration::days(7));
        assert!(record.is_valid(now));
    }
}
