/// Authentication module
///
/// Handles JWT token generation/validation, password hashing, refresh
/// token management, failed-attempt rate limiting and the `AuthService`
/// that ties them to the stores.

mod claims;
mod jwt;
mod password;
mod rate_limit;
mod refresh_token;
mod service;

pub use claims::Claims;
pub use jwt::generate_access_token;
pub use jwt::validate_access_token;
pub use password::hash_password;
pub use password::verify_password;
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use refresh_token::generate_refresh_token;
pub use refresh_token::hash_token;
pub use service::{AuthResult, AuthService, NewUser, TokenPair};
