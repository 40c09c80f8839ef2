use actix_web::dev::Server;
use actix_web::middleware::DefaultHeaders;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{AuthService, RateLimiter};
use crate::middleware::{JwtMiddleware, LoggerMiddleware};
use crate::routes::{
    change_password, health_check, json_error_handler, login, logout, me, refresh, register,
    revoke_all_tokens,
};

/// Headers added to every response
fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("Referrer-Policy", "no-referrer"))
        .add(("Cache-Control", "no-store"))
        .add(("Strict-Transport-Security", "max-age=31536000; includeSubDomains"))
}

pub fn run(
    listener: TcpListener,
    auth_service: Arc<AuthService>,
    rate_limiter: Arc<RateLimiter>,
) -> Result<Server, std::io::Error> {
    let jwt_config = auth_service.jwt_settings().clone();
    let auth_service = web::Data::from(auth_service);
    let rate_limiter = web::Data::from(rate_limiter);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(security_headers())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(auth_service.clone())
            .app_data(rate_limiter.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))

            // Public routes (no authentication required)
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::post().to(logout))

                    // Protected routes (require JWT authentication)
                    .service(
                        web::resource("/me")
                            .wrap(JwtMiddleware::new(jwt_config.clone()))
                            .route(web::get().to(me)),
                    )
                    .service(
                        web::resource("/change-password")
                            .wrap(JwtMiddleware::new(jwt_config.clone()))
                            .route(web::post().to(change_password)),
                    )
                    .service(
                        web::resource("/revoke-all-tokens")
                            .wrap(JwtMiddleware::new(jwt_config.clone()))
                            .route(web::post().to(revoke_all_tokens)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
