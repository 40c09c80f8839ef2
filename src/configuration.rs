use config::{Config, ConfigError, Environment, File};

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub rate_limit: RateLimitSettings,
    pub password: PasswordSettings,
}

/// Where user and refresh-token records live
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// Process-local maps; state is lost on restart
    Memory,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT authentication settings
#[derive(serde::Deserialize, Clone, Debug)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,   // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_expiry: i64,  // seconds (e.g., 604800 for 7 days)
    pub issuer: String,
}

/// Failed-attempt throttling for the credential endpoints
#[derive(serde::Deserialize, Clone, Debug)]
pub struct RateLimitSettings {
    pub max_attempts: u32,
    pub window_seconds: i64,
    pub purge_interval_seconds: u64,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct PasswordSettings {
    /// bcrypt work factor
    pub hash_cost: u32,
}

/// Loads settings from defaults, an optional `configuration` file and
/// `APP_`-prefixed environment variables (`APP_JWT__SECRET=...`), in that
/// order of precedence.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8080)?
        .set_default("application.storage", "postgres")?
        .set_default("database.username", "postgres")?
        .set_default("database.password", "password")?
        .set_default("database.port", 5432)?
        .set_default("database.host", "localhost")?
        .set_default("database.database_name", "plantcare")?
        .set_default("database.max_connections", 5)?
        .set_default("database.acquire_timeout_seconds", 5)?
        .set_default("jwt.access_token_expiry", 900)?
        .set_default("jwt.refresh_token_expiry", 604_800)?
        .set_default("jwt.issuer", "plantcare")?
        .set_default("rate_limit.max_attempts", 5)?
        .set_default("rate_limit.window_seconds", 900)?
        .set_default("rate_limit.purge_interval_seconds", 60)?
        .set_default("password.hash_cost", bcrypt::DEFAULT_COST as i64)?
        .add_source(File::with_name("configuration").required(false))
        .add_source(
            Environment::with_prefix("app")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
