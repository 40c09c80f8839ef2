mod auth;
mod health_check;

pub use auth::{change_password, login, logout, me, refresh, register, revoke_all_tokens};
pub use health_check::health_check;

use actix_web::{error::JsonPayloadError, HttpRequest};

use crate::error::{AppError, ValidationError};

/// Renders unreadable JSON bodies (bad syntax, wrong types, wrong content
/// type) as a `VALIDATION_ERROR` envelope.
pub fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(path = %req.path(), error = %err, "Rejected request body");
    AppError::Validation(ValidationError::single("body", err.to_string())).into()
}
