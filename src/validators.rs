/// Input validators
///
/// Field rules shared by the request schemas in `routes::auth`:
/// 1. Email format and length (RFC 5321 / simplified RFC 5322)
/// 2. Display name length and control-character screening
/// 3. Password complexity
///
/// Each rule has a plain form returning `RuleViolation` and an adapter with
/// the signature `validator`'s `custom` attribute expects.

use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MAX_LOCAL_PART_LENGTH: usize = 64;
const MAX_NAME_LENGTH: usize = 100;
pub const MIN_PASSWORD_LENGTH: usize = 8;
// bcrypt only looks at the first 72 bytes; the cap also bounds hashing work.
pub const MAX_PASSWORD_LENGTH: usize = 128;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    ).expect("email regex is valid");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleViolation {
    EmptyField(&'static str),
    TooShort(&'static str, usize),
    TooLong(&'static str, usize),
    InvalidFormat(&'static str),
    SuspiciousContent(&'static str),
    WeakPassword,
}

impl RuleViolation {
    fn code(&self) -> &'static str {
        match self {
            RuleViolation::EmptyField(_) => "required",
            RuleViolation::TooShort(_, _) => "too_short",
            RuleViolation::TooLong(_, _) => "too_long",
            RuleViolation::InvalidFormat(_) => "invalid_format",
            RuleViolation::SuspiciousContent(_) => "suspicious_content",
            RuleViolation::WeakPassword => "weak_password",
        }
    }
}

impl std::fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleViolation::EmptyField(field) => write!(f, "{} is required", field),
            RuleViolation::TooShort(field, min) => write!(f, "{} is too short (minimum {} characters)", field, min),
            RuleViolation::TooLong(field, max) => write!(f, "{} is too long (maximum {} characters)", field, max),
            RuleViolation::InvalidFormat(field) => write!(f, "{} has invalid format", field),
            RuleViolation::SuspiciousContent(field) => write!(f, "{} contains invalid characters", field),
            RuleViolation::WeakPassword => write!(
                f,
                "password must contain at least one uppercase letter, one lowercase letter, one digit and one symbol"
            ),
        }
    }
}

impl std::error::Error for RuleViolation {}

impl From<RuleViolation> for validator::ValidationError {
    fn from(violation: RuleViolation) -> Self {
        let mut err = validator::ValidationError::new(violation.code());
        err.message = Some(Cow::from(violation.to_string()));
        err
    }
}

/// Normalises an email address for storage and lookup: trimmed and lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates an email address and returns its normalised form
pub fn is_valid_email(email: &str) -> Result<String, RuleViolation> {
    let normalized = normalize_email(email);

    if normalized.is_empty() {
        return Err(RuleViolation::EmptyField("email"));
    }

    if normalized.len() > MAX_EMAIL_LENGTH {
        return Err(RuleViolation::TooLong("email", MAX_EMAIL_LENGTH));
    }

    if has_suspicious_email_patterns(&normalized) {
        return Err(RuleViolation::SuspiciousContent("email"));
    }

    if !EMAIL_REGEX.is_match(&normalized) {
        return Err(RuleViolation::InvalidFormat("email"));
    }

    Ok(normalized)
}

/// Validates an optional display name (first or last name)
pub fn is_valid_name(name: &str) -> Result<String, RuleViolation> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(RuleViolation::EmptyField("name"));
    }

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(RuleViolation::TooLong("name", MAX_NAME_LENGTH));
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(RuleViolation::SuspiciousContent("name"));
    }

    Ok(trimmed.to_string())
}

/// Password complexity requirements:
/// - 8 to 128 characters
/// - at least one uppercase letter, one lowercase letter, one digit and one symbol
pub fn check_password_strength(password: &str) -> Result<(), RuleViolation> {
    let length = password.chars().count();

    if length < MIN_PASSWORD_LENGTH {
        return Err(RuleViolation::TooShort("password", MIN_PASSWORD_LENGTH));
    }

    if length > MAX_PASSWORD_LENGTH {
        return Err(RuleViolation::TooLong("password", MAX_PASSWORD_LENGTH));
    }

    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_symbol = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    if !(has_digit && has_lowercase && has_uppercase && has_symbol) {
        return Err(RuleViolation::WeakPassword);
    }

    Ok(())
}

/// Login only checks presence and the upper bound; strength rules apply to
/// new passwords, not to existing ones.
pub fn check_login_password(password: &str) -> Result<(), RuleViolation> {
    if password.is_empty() {
        return Err(RuleViolation::EmptyField("password"));
    }

    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(RuleViolation::TooLong("password", MAX_PASSWORD_LENGTH));
    }

    Ok(())
}

/// Detects structural problems the regex alone lets through
fn has_suspicious_email_patterns(email: &str) -> bool {
    if email.matches('@').count() != 1 {
        return true;
    }

    if let Some(at_pos) = email.find('@') {
        if at_pos > MAX_LOCAL_PART_LENGTH {
            return true;
        }
    }

    email.chars().any(|c| c.is_control())
}

// ============================================================================
// `validator` adapters
// ============================================================================

pub fn validate_email_address(email: &str) -> Result<(), validator::ValidationError> {
    is_valid_email(email).map(|_| ()).map_err(Into::into)
}

pub fn validate_name(name: &str) -> Result<(), validator::ValidationError> {
    is_valid_name(name).map(|_| ()).map_err(Into::into)
}

pub fn validate_password_complexity(password: &str) -> Result<(), validator::ValidationError> {
    check_password_strength(password).map_err(Into::into)
}

pub fn validate_login_password(password: &str) -> Result<(), validator::ValidationError> {
    check_login_password(password).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_password_presence_and_length() {
        assert!(check_login_password("x").is_ok());
        assert!(check_login_password(&"a".repeat(MAX_PASSWORD_LENGTH)).is_ok());
        assert_eq!(check_login_password(""), Err(RuleViolation::EmptyField("password")));
        assert_eq!(
            check_login_password(&"a".repeat(MAX_PASSWORD_LENGTH + 1)),
            Err(RuleViolation::TooLong("password", MAX_PASSWORD_LENGTH))
        );
    }

    #[test]
    fn test_valid_email() {
        assert!(is_valid_email("user@example.com").is_ok());
        assert!(is_valid_email("test.email@domain.co.uk").is_ok());
        assert!(is_valid_email("user+tag@example.com").is_ok());
    }

    #[test]
    fn test_email_is_normalized() {
        assert_eq!(
            is_valid_email("  Alice@Example.COM ").unwrap(),
            "alice@example.com"
        );
    }

    #[test]
    fn test_invalid_email_format() {
        assert!(is_valid_email("invalid").is_err());
        assert!(is_valid_email("user@").is_err());
        assert!(is_valid_email("@example.com").is_err());
        assert!(is_valid_email("user@@example.com").is_err());
        assert!(is_valid_email("user@localhost").is_err());
        assert_eq!(is_valid_email("   "), Err(RuleViolation::EmptyField("email")));
    }

    #[test]
    fn test_email_length_limits() {
        let too_long = format!("{}@example.com", "a".repeat(250));
        assert!(is_valid_email(&too_long).is_err());

        let long_local = format!("{}@example.com", "a".repeat(65));
        assert_eq!(
            is_valid_email(&long_local),
            Err(RuleViolation::SuspiciousContent("email"))
        );
    }

    #[test]
    fn test_valid_name() {
        assert_eq!(is_valid_name(" Jean-Pierre ").unwrap(), "Jean-Pierre");
        assert!(is_valid_name("O'Brien").is_ok());
        assert!(is_valid_name("Castillo").is_ok());
    }

    #[test]
    fn test_invalid_name() {
        assert!(is_valid_name("").is_err());
        assert!(is_valid_name(&"a".repeat(101)).is_err());
        assert!(is_valid_name("Name\0with\0null").is_err());
    }

    #[test]
    fn test_password_strength() {
        assert!(check_password_strength("Passw0rd!").is_ok());
        assert_eq!(
            check_password_strength("Pa0!"),
            Err(RuleViolation::TooShort("password", MIN_PASSWORD_LENGTH))
        );
        assert_eq!(
            check_password_strength("Password1"),
            Err(RuleViolation::WeakPassword)
        );
        assert_eq!(
            check_password_strength("password1!"),
            Err(RuleViolation::WeakPassword)
        );
        assert_eq!(
            check_password_strength("PASSWORD1!"),
            Err(RuleViolation::WeakPassword)
        );
        assert_eq!(
            check_password_strength("Password!!"),
            Err(RuleViolation::WeakPassword)
        );

        let too_long = format!("Aa1!{}", "x".repeat(MAX_PASSWORD_LENGTH));
        assert!(check_password_strength(&too_long).is_err());
    }

    #[test]
    fn test_validator_adapter_carries_message() {
        let err = validate_password_complexity("short").unwrap_err();
        assert_eq!(err.code, "too_short");
        assert!(err.message.unwrap().contains("minimum 8"));
    }
}
