/// Configuration management for the API server
///
/// Configuration is read from environment variables (after loading a `.env`
/// file if present) through the `config` crate, on top of built-in defaults.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `API_CORS_ORIGINS`: Comma-separated allowed origins (default: `*`)
/// - `API_PRODUCTION`: Enables HSTS (default: false)
/// - `DATABASE_URL`: PostgreSQL connection string for the application role (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `DATABASE_OPERATION_TIMEOUT_MS`: Deadline per scoped transaction, 0 disables (default: 5000)
/// - `DATABASE_RUN_MIGRATIONS`: Run bundled migrations at startup (default: false)
/// - `DATABASE_CHECK_RELEASED_CONNECTIONS`: Discard pooled connections that still
///   carry a tenant marker (default: false)
/// - `JWT_SECRET`: HS256 signing secret, at least 32 characters (required)
/// - `JWT_ACCESS_TTL_SECONDS` / `JWT_REFRESH_TTL_SECONDS`: Token lifetimes
/// - `LOG_FORMAT`: `pretty` or `json` (default: pretty)
///
/// # Example
///
/// ```no_run
/// use haven_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use haven_shared::auth::jwt::{DEFAULT_ACCESS_TTL_SECONDS, DEFAULT_REFRESH_TTL_SECONDS, MIN_SECRET_LEN};
use haven_shared::db::pool::DatabaseConfig;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseSettings,
    pub jwt: JwtConfig,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode adds HSTS
    pub production: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,

    /// Deadline for each scoped transaction in milliseconds; 0 disables it
    pub operation_timeout_ms: u64,

    pub run_migrations: bool,

    pub check_released_connections: bool,
}

#[derive(Clone)]
pub struct JwtConfig {
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Flat view of the environment, one field per variable
#[derive(Debug, Deserialize)]
struct RawConfig {
    api_host: String,
    api_port: u16,
    api_cors_origins: String,
    api_production: bool,
    database_url: Option<String>,
    database_max_connections: u32,
    database_operation_timeout_ms: u64,
    database_run_migrations: bool,
    database_check_released_connections: bool,
    jwt_secret: Option<String>,
    jwt_access_ttl_seconds: i64,
    jwt_refresh_ttl_seconds: i64,
    log_format: LogFormat,
}

impl Config {
    /// Loads configuration from the environment
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DATABASE_URL` or `JWT_SECRET` is missing
    /// - `JWT_SECRET` is shorter than 32 characters
    /// - a variable has an unparseable value
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let settings = Self::builder()?
            .add_source(config::Environment::default())
            .build()?;

        Self::from_settings(settings)
    }

    /// Defaults for every optional key
    pub fn builder() -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(config::Config::builder()
            .set_default("api_host", "0.0.0.0")?
            .set_default("api_port", 8080)?
            .set_default("api_cors_origins", "*")?
            .set_default("api_production", false)?
            .set_default("database_max_connections", 10)?
            .set_default("database_operation_timeout_ms", 5000)?
            .set_default("database_run_migrations", false)?
            .set_default("database_check_released_connections", false)?
            .set_default("jwt_access_ttl_seconds", DEFAULT_ACCESS_TTL_SECONDS)?
            .set_default("jwt_refresh_ttl_seconds", DEFAULT_REFRESH_TTL_SECONDS)?
            .set_default("log_format", "pretty")?)
    }

    /// Validates and assembles already-collected settings
    pub fn from_settings(settings: config::Config) -> anyhow::Result<Self> {
        let raw: RawConfig = settings.try_deserialize()?;

        let database_url = raw
            .database_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let jwt_secret = raw
            .jwt_secret
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {} characters long", MIN_SECRET_LEN);
        }
        if raw.jwt_access_ttl_seconds <= 0 || raw.jwt_refresh_ttl_seconds <= 0 {
            anyhow::bail!("JWT token lifetimes must be positive");
        }

        let cors_origins = raw
            .api_cors_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            api: ApiConfig {
                host: raw.api_host,
                port: raw.api_port,
                cors_origins,
                production: raw.api_production,
            },
            database: DatabaseSettings {
                url: database_url,
                max_connections: raw.database_max_connections,
                operation_timeout_ms: raw.database_operation_timeout_ms,
                run_migrations: raw.database_run_migrations,
                check_released_connections: raw.database_check_released_connections,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                access_ttl_seconds: raw.jwt_access_ttl_seconds,
                refresh_ttl_seconds: raw.jwt_refresh_ttl_seconds,
            },
            log_format: raw.log_format,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

impl DatabaseSettings {
    /// Pool settings for [`haven_shared::db::pool::create_pool`]
    pub fn pool_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            discard_scoped_connections: self.check_released_connections,
            ..Default::default()
        }
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        match self.operation_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
