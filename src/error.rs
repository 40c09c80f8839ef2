/// Error Handling Module
///
/// Unified error handling for the auth subsystem.
/// It covers:
/// 1. Domain-specific error types (validation, conflicts, authentication, storage)
/// 2. The unified `AppError` used for control flow
/// 3. HTTP mapping to the `{ "error": { code, message, details } }` envelope
/// 4. Structured error logging with context

use actix_web::{
    error::ResponseError,
    http::{header, StatusCode},
    HttpResponse,
};
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// A single offending request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Request validation failure listing every offending field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            fields: vec![FieldError {
                field: field.into(),
                message: message.into(),
            }],
        }
    }

    /// Names of the offending fields, in report order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.field.as_str()).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "invalid request: {}", parts.join("; "))
    }
}

impl StdError for ValidationError {}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = camel_case(field);
                errs.iter().map(move |e| FieldError {
                    field: field.clone(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        // HashMap iteration order is unstable; keep reports deterministic.
        fields.sort_by(|a, b| a.field.cmp(&b.field).then(a.message.cmp(&b.message)));
        Self { fields }
    }
}

/// Request payloads use camelCase while schema fields are snake_case.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Resource conflicts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictError {
    UserAlreadyExists,
}

impl fmt::Display for ConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictError::UserAlreadyExists => write!(f, "A user with this email already exists"),
        }
    }
}

impl StdError for ConflictError {}

/// Authentication and authorization errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown email, soft-deleted account or wrong password
    InvalidCredentials,
    /// Refresh token unknown, revoked, expired or orphaned
    InvalidRefreshToken,
    InvalidCurrentPassword,
    /// No usable bearer token, or the account behind it is gone
    Unauthorized,
    /// Bearer token present but malformed, tampered or expired
    TokenInvalid,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid email or password"),
            AuthError::InvalidRefreshToken => write!(f, "Invalid or expired refresh token"),
            AuthError::InvalidCurrentPassword => write!(f, "Current password is incorrect"),
            AuthError::Unauthorized => write!(f, "Authentication required"),
            AuthError::TokenInvalid => write!(f, "Invalid or expired token"),
        }
    }
}

impl StdError for AuthError {}

/// Database operation errors
#[derive(Debug)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    QueryExecution(String),
    ConnectionPool(String),
    UnexpectedError(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(msg) => {
                write!(f, "Duplicate entry: {}", msg)
            }
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::UnexpectedError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that all application errors map to
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Conflict(ConflictError),
    Auth(AuthError),
    RateLimited { retry_after_seconds: u64 },
    Database(DatabaseError),
    Config(String),
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code carried in the error envelope
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Conflict(ConflictError::UserAlreadyExists) => "USER_ALREADY_EXISTS",
            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
                AuthError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
                AuthError::InvalidCurrentPassword => "INVALID_CURRENT_PASSWORD",
                AuthError::Unauthorized => "UNAUTHORIZED",
                AuthError::TokenInvalid => "TOKEN_INVALID",
            },
            AppError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::Database(DatabaseError::ConnectionPool(_)) => "SERVICE_UNAVAILABLE",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a rate-limited endpoint should record this outcome as a failed attempt.
    ///
    /// Only authentication failures and registration conflicts count; storage
    /// faults and validation errors do not.
    pub fn counts_as_failed_attempt(&self) -> bool {
        matches!(
            self,
            AppError::Auth(AuthError::InvalidCredentials)
                | AppError::Auth(AuthError::InvalidRefreshToken)
                | AppError::Conflict(_)
        )
    }

    /// Client-facing message. Server-side failures are never described in detail.
    fn public_message(&self) -> String {
        match self {
            AppError::Validation(_) => "Request validation failed".to_string(),
            AppError::Conflict(e) => e.to_string(),
            AppError::Auth(e) => e.to_string(),
            AppError::RateLimited { .. } => {
                "Too many attempts, please try again later".to_string()
            }
            AppError::Database(DatabaseError::ConnectionPool(_)) => {
                "Database service temporarily unavailable".to_string()
            }
            AppError::Database(_) => "Database error occurred".to_string(),
            AppError::Config(_) => "Server configuration error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Validation(e) => serde_json::to_value(&e.fields).ok(),
            AppError::RateLimited { retry_after_seconds } => Some(serde_json::json!({
                "retryAfterSeconds": retry_after_seconds
            })),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Conflict(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::RateLimited { retry_after_seconds } => {
                write!(f, "Rate limit exceeded, retry after {}s", retry_after_seconds)
            }
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.into())
    }
}

impl From<ConflictError> for AppError {
    fn from(err: ConflictError) -> Self {
        AppError::Conflict(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                AppError::Database(DatabaseError::UniqueConstraintViolation(
                    db.message().to_string(),
                ))
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::Database(DatabaseError::ConnectionPool(err.to_string()))
            }
            sqlx::Error::Database(_) | sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                AppError::Database(DatabaseError::QueryExecution(err.to_string()))
            }
            _ => AppError::Database(DatabaseError::UnexpectedError(err.to_string())),
        }
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Body of the error envelope
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// `{ "error": { ... } }`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self) -> (StatusCode, ErrorResponse);
    fn log_error(&self, error_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response(&self) -> (StatusCode, ErrorResponse) {
        let mut body = ErrorResponse::new(self.code(), self.public_message());
        if let Some(details) = self.details() {
            body = body.with_details(details);
        }
        (ResponseError::status_code(self), body)
    }

    fn log_error(&self, error_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Validation error");
            }
            AppError::Conflict(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Conflict");
            }
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!(error_id = error_id, "Invalid credentials attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Authentication error");
            }
            AppError::RateLimited { retry_after_seconds } => {
                tracing::warn!(
                    error_id = error_id,
                    retry_after_seconds = *retry_after_seconds,
                    "Rate limit exceeded"
                );
            }
            AppError::Database(e) => {
                tracing::error!(error_id = error_id, error = %e, "Database error");
            }
            AppError::Config(msg) => {
                tracing::error!(error_id = error_id, error = %msg, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(error_id = error_id, error = %msg, "Internal error");
            }
        }
    }
}

/// Implement ResponseError for Actix-web integration
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&error_id);

        let (status, body) = <Self as ErrorHandler>::error_response(self);
        let mut builder = HttpResponse::build(status);
        if let AppError::RateLimited { retry_after_seconds } = self {
            builder.insert_header((header::RETRY_AFTER, retry_after_seconds.to_string()));
        }
        builder.json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Auth(AuthError::InvalidCurrentPassword) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(DatabaseError::ConnectionPool(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Per-operation context used to correlate log lines of one request
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: String,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
        }
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn log_error(&self, error: &AppError) {
        match error {
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                tracing::error!(
                    request_id = %self.request_id,
                    operation = %self.operation,
                    user_id = ?self.user_id,
                    error = %error,
                    "Operation failed"
                );
            }
            _ => {
                tracing::warn!(
                    request_id = %self.request_id,
                    operation = %self.operation,
                    user_id = ?self.user_id,
                    code = error.code(),
                    "Operation rejected"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_camel_case_field_names() {
        assert_eq!(camel_case("device_id"), "deviceId");
        assert_eq!(camel_case("current_password"), "currentPassword");
        assert_eq!(camel_case("email"), "email");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Conflict(ConflictError::UserAlreadyExists).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Auth(AuthError::InvalidCredentials).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Auth(AuthError::InvalidCurrentPassword).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::RateLimited { retry_after_seconds: 10 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_failed_attempt_classification() {
        assert!(AppError::Auth(AuthError::InvalidCredentials).counts_as_failed_attempt());
        assert!(AppError::Auth(AuthError::InvalidRefreshToken).counts_as_failed_attempt());
        assert!(AppError::Conflict(ConflictError::UserAlreadyExists).counts_as_failed_attempt());
        assert!(!AppError::Internal("boom".into()).counts_as_failed_attempt());
        assert!(!AppError::Validation(ValidationError::default()).counts_as_failed_attempt());
    }

    #[actix_web::test]
    async fn test_envelope_shape() {
        let err = AppError::Validation(ValidationError::single("email", "is required"));
        let response = ResponseError::error_response(&err);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"]["details"][0]["field"], "email");
    }

    #[actix_web::test]
    async fn test_internal_errors_are_opaque() {
        let err = AppError::Internal("connection string leaked".into());
        let response = ResponseError::error_response(&err);
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["message"], "Internal server error");
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let err = AppError::RateLimited { retry_after_seconds: 42 };
        let response = ResponseError::error_response(&err);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "42"
        );
    }
}
