use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use plantcare::auth::{AuthService, RateLimitConfig, RateLimiter};
use plantcare::clock::{Clock, SystemClock};
use plantcare::configuration::{get_configuration, Settings, StorageBackend};
use plantcare::startup::run;
use plantcare::store::{
    CredentialStore, InMemoryCredentialStore, InMemoryTokenStore, PgCredentialStore,
    PgTokenStore, TokenStore,
};
use plantcare::telemetry::init_telemetry;

type Stores = (Arc<dyn CredentialStore>, Arc<dyn TokenStore>);

async fn build_stores(configuration: &Settings) -> std::io::Result<Stores> {
    match configuration.application.storage {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; all accounts are lost on restart");
            Ok((
                Arc::new(InMemoryCredentialStore::new()),
                Arc::new(InMemoryTokenStore::new()),
            ))
        }
        StorageBackend::Postgres => {
            let database = &configuration.database;
            tracing::info!(host = %database.host, "Attempting to connect to database");

            let pool = PgPoolOptions::new()
                .max_connections(database.max_connections)
                .acquire_timeout(Duration::from_secs(database.acquire_timeout_seconds))
                .connect(&database.connection_string())
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create connection pool: {}", e);
                    std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "Database connection error",
                    )
                })?;

            sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
            })?;
            tracing::info!("Database connection pool created successfully");

            Ok((
                Arc::new(PgCredentialStore::new(pool.clone())),
                Arc::new(PgTokenStore::new(pool)),
            ))
        }
    }
}

/// Periodically drops rate-limit keys whose window has emptied
fn spawn_rate_limit_purge(rate_limiter: Arc<RateLimiter>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let purged = rate_limiter.purge_idle().await;
            if purged > 0 {
                tracing::debug!(purged, "Purged idle rate-limit keys");
            }
        }
    });
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let (credentials, tokens) = build_stores(&configuration).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let auth_service = Arc::new(AuthService::new(
        credentials,
        tokens,
        configuration.jwt.clone(),
        configuration.password.hash_cost,
        clock.clone(),
    ));
    let rate_limiter = Arc::new(RateLimiter::new(
        RateLimitConfig::from(&configuration.rate_limit),
        clock,
    ));
    spawn_rate_limit_purge(
        rate_limiter.clone(),
        Duration::from_secs(configuration.rate_limit.purge_interval_seconds.max(1)),
    );

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, auth_service, rate_limiter)?;
    server.await
}
