/// Authentication Routes
///
/// Handles registration, login, token refresh, logout, the current user and
/// password/session management. Every handler validates its payload before
/// the `AuthService` is called; credential endpoints additionally pass through
/// the failed-attempt `RateLimiter`.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use std::future::Future;
use validator::Validate;

use crate::auth::{AuthService, Claims, NewUser, RateLimiter, TokenPair};
use crate::error::{AppError, ErrorContext};
use crate::store::UserProfile;
use crate::validators::{
    normalize_email, validate_email_address, validate_login_password, validate_name,
    validate_password_complexity,
};

// ============================================================================
// Request / response bodies
// ============================================================================

/// Missing fields deserialize as empty strings so they are reported as
/// validation errors rather than as JSON errors.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(custom = "validate_email_address")]
    pub email: String,
    #[validate(custom = "validate_password_complexity")]
    pub password: String,
    #[validate(length(min = 1, max = 128, message = "deviceId must be 1 to 128 characters"))]
    pub device_id: String,
    #[validate(custom = "validate_name")]
    pub first_name: Option<String>,
    #[validate(custom = "validate_name")]
    pub last_name: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(custom = "validate_email_address")]
    pub email: String,
    #[validate(custom = "validate_login_password")]
    pub password: String,
    #[validate(length(min = 1, max = 128, message = "deviceId must be 1 to 128 characters"))]
    pub device_id: String,
}

/// Body of `/auth/refresh` and `/auth/logout`
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "refreshToken is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "currentPassword is required"))]
    pub current_password: String,
    #[validate(custom = "validate_password_complexity")]
    pub new_password: String,
}

#[derive(Serialize)]
pub struct TokensResponse {
    pub tokens: TokenPair,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub user: UserProfile,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct RevokedResponse {
    pub message: &'static str,
    pub revoked: u64,
}

// ============================================================================
// Rate limiting helpers
// ============================================================================

fn email_key(email: &str) -> String {
    format!("email:{}", normalize_email(email))
}

fn client_key(req: &HttpRequest) -> String {
    let ip = req
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!("ip:{}", ip)
}

/// Runs `attempt` behind the limiter: rejected up front once the key is
/// exhausted, and recorded afterwards if it failed in a way that counts.
async fn throttled<T, F>(limiter: &RateLimiter, key: &str, attempt: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    limiter.check(key).await?;

    let result = attempt.await;
    if let Err(e) = &result {
        if e.counts_as_failed_attempt() {
            limiter.record_failure(key).await;
        }
    }
    result
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
///
/// # Errors
/// - 400: Validation errors
/// - 409: Email already registered
/// - 429: Too many failed attempts for this email
pub async fn register(
    body: web::Json<RegisterRequest>,
    service: web::Data<AuthService>,
    limiter: web::Data<RateLimiter>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");
    body.validate()?;

    let body = body.into_inner();
    let key = email_key(&body.email);
    let new_user = NewUser {
        email: normalize_email(&body.email),
        password: body.password,
        device_id: body.device_id,
        first_name: body.first_name.map(|n| n.trim().to_string()),
        last_name: body.last_name.map(|n| n.trim().to_string()),
    };

    let result = throttled(&limiter, &key, service.register(new_user))
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    Ok(HttpResponse::Created().json(result))
}

/// POST /auth/login
///
/// Unknown email and wrong password produce the same 401 so accounts cannot
/// be enumerated.
pub async fn login(
    body: web::Json<LoginRequest>,
    service: web::Data<AuthService>,
    limiter: web::Data<RateLimiter>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");
    body.validate()?;

    let email = normalize_email(&body.email);
    let key = email_key(&email);

    let result = throttled(
        &limiter,
        &key,
        service.login(&email, &body.password, &body.device_id),
    )
    .await
    .map_err(|e| {
        context.log_error(&e);
        e
    })?;

    Ok(HttpResponse::Ok().json(result))
}

/// POST /auth/refresh
///
/// Rotates the refresh token; the presented one stops working.
pub async fn refresh(
    req: HttpRequest,
    body: web::Json<RefreshRequest>,
    service: web::Data<AuthService>,
    limiter: web::Data<RateLimiter>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");
    body.validate()?;

    let key = client_key(&req);
    let tokens = throttled(&limiter, &key, service.refresh_tokens(&body.refresh_token))
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    Ok(HttpResponse::Ok().json(TokensResponse { tokens }))
}

/// POST /auth/logout
///
/// Always 200, even for unknown, revoked or missing tokens.
pub async fn logout(
    body: Option<web::Json<RefreshRequest>>,
    service: web::Data<AuthService>,
) -> HttpResponse {
    match body {
        Some(body) if !body.refresh_token.is_empty() => {
            service.logout(&body.refresh_token).await;
        }
        _ => tracing::debug!("Logout without a refresh token"),
    }

    HttpResponse::Ok().json(MessageResponse {
        message: "Logged out",
    })
}

/// GET /auth/me
pub async fn me(
    claims: web::ReqData<Claims>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let user = service.current_user(user_id).await?;

    Ok(HttpResponse::Ok().json(UserResponse { user }))
}

/// POST /auth/change-password
///
/// Revokes every refresh token of the user on success.
///
/// # Errors
/// - 400: Validation errors, or `INVALID_CURRENT_PASSWORD`
pub async fn change_password(
    claims: web::ReqData<Claims>,
    body: web::Json<ChangePasswordRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    let user_id = claims.user_id()?;
    let context = ErrorContext::new("change_password").with_user_id(user_id.to_string());

    service
        .change_password(user_id, &body.current_password, &body.new_password)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Password changed",
    }))
}

/// POST /auth/revoke-all-tokens
pub async fn revoke_all_tokens(
    claims: web::ReqData<Claims>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let revoked = service.revoke_all_tokens(user_id).await?;

    Ok(HttpResponse::Ok().json(RevokedResponse {
        message: "All sessions revoked",
        revoked,
    }))
}
