/// JWT Authentication Middleware
///
/// Validates the bearer access token from the Authorization header and
/// injects its claims into request extensions for use by route handlers.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::validate_access_token;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// JWT middleware for protecting routes
///
/// Must be applied to routes that require authentication. Rejections use the
/// regular error envelope: `UNAUTHORIZED` when no bearer token is present,
/// `TOKEN_INVALID` when one is present but does not validate.
pub struct JwtMiddleware {
    jwt_config: JwtSettings,
}

impl JwtMiddleware {
    pub fn new(jwt_config: JwtSettings) -> Self {
        Self { jwt_config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            jwt_config: self.jwt_config.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    jwt_config: JwtSettings,
}

/// Token part of `Authorization: Bearer <token>`
fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = match bearer_token(&req) {
            Some(token) => token,
            None => {
                tracing::warn!(path = %req.path(), "Missing or invalid Authorization header");
                return Box::pin(async { Err(AppError::Auth(AuthError::Unauthorized).into()) });
            }
        };

        match validate_access_token(&token, &self.jwt_config) {
            Ok(claims) => {
                tracing::debug!(user_id = %claims.sub, "JWT validated successfully");
                req.extensions_mut().insert(claims);

                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(e) => Box::pin(async move { Err(e.into()) }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{generate_access_token, Claims};
    use crate::store::User;
    use actix_web::{test, web, App, HttpResponse};
    use chrono::Utc;

    fn jwt_config() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604_800,
            issuer: "test".to_string(),
        }
    }

    async fn whoami(claims: web::ReqData<Claims>) -> HttpResponse {
        HttpResponse::Ok().body(claims.email.clone())
    }

    #[actix_web::test]
    async fn test_valid_token_reaches_handler() {
        let config = jwt_config();
        let user = User::new("a@example.com".into(), "h".into(), None, None, Utc::now());
        let token = generate_access_token(&user, Utc::now(), &config).unwrap();

        let app = test::init_service(
            App::new().service(
                web::resource("/me")
                    .wrap(JwtMiddleware::new(config))
                    .route(web::get().to(whoami)),
            ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "a@example.com");
    }

    #[actix_web::test]
    async fn test_missing_and_invalid_tokens_are_rejected() {
        let app = test::init_service(
            App::new().service(
                web::resource("/me")
                    .wrap(JwtMiddleware::new(jwt_config()))
                    .route(web::get().to(whoami)),
            ),
        )
        .await;

        let req = test::TestRequest::get().uri("/me").to_request();
        let err = test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), 401);
        assert_eq!(err.to_string(), AuthError::Unauthorized.to_string());

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header((header::AUTHORIZATION, "Bearer not.a.jwt"))
            .to_request();
        let err = test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(err.to_string(), AuthError::TokenInvalid.to_string());
    }
}
