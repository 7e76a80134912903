/// Configuration management for the API server
///
/// Configuration is read once at start-up from environment variables (a
/// `.env` file is loaded first when present).
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `PORT`: Port to bind to (default: 3000)
/// - `APP_ENV` / `NODE_ENV`: `development` or `production` (default: development)
/// - `PUBLIC_DIR`: Static files and uploaded images (default: public)
/// - `DATABASE_URL`: PostgreSQL connection string; `<USERNAME>` and
///   `<PASSWORD>` are replaced by `DATABASE_USERNAME` / `DATABASE_PASSWORD`.
///   Without it the server runs on the in-memory store.
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Secret key for JWT signing (required, at least 32 characters)
/// - `JWT_EXPIRES_IN_DAYS`: Token lifetime (default: 90)
/// - `JWT_COOKIE_EXPIRES_IN_DAYS`: `jwt` cookie lifetime (default: 90)
/// - `RATE_LIMIT_MAX`: Requests per window and client IP (default: 100)
/// - `RATE_LIMIT_WINDOW_SECS`: Rate limit window (default: 3600)
/// - `RUST_LOG`: Log filter (default: natourex_api=debug,tower_http=debug)
///
/// # Example
///
/// ```no_run
/// use natourex_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Rate limiting of `/api` paths
    pub rate_limit: RateLimitConfig,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => anyhow::bail!("Unknown environment '{}'", other),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    pub environment: Environment,

    /// Root of the static files; tour images are written to `img/tours`
    pub public_dir: PathBuf,
}

impl ApiConfig {
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL with credentials substituted
    pub url: Option<String>,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    /// Token lifetime in days
    pub expires_in_days: i64,

    /// `jwt` cookie lifetime in days
    pub cookie_expires_in_days: i64,
}

/// Rate limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window and client IP
    pub max_requests: u32,

    /// Window length in seconds
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 3600,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `JWT_SECRET` is missing or shorter than 32 characters
    /// - Numeric variables or the environment name have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_var("PORT", 3000u16)?;

        let environment = env::var("APP_ENV")
            .or_else(|_| env::var("NODE_ENV"))
            .map(|raw| raw.parse::<Environment>())
            .unwrap_or(Ok(Environment::Development))?;

        let public_dir = env::var("PUBLIC_DIR").unwrap_or_else(|_| "public".to_string());

        let database_url = env::var("DATABASE_URL").ok().map(|url| {
            substitute_credentials(
                &url,
                env::var("DATABASE_USERNAME").ok().as_deref(),
                env::var("DATABASE_PASSWORD").ok().as_deref(),
            )
        });

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                environment,
                public_dir: PathBuf::from(public_dir),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10u32)?,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                expires_in_days: parse_var("JWT_EXPIRES_IN_DAYS", 90i64)?,
                cookie_expires_in_days: parse_var("JWT_COOKIE_EXPIRES_IN_DAYS", 90i64)?,
            },
            rate_limit: RateLimitConfig {
                max_requests: parse_var("RATE_LIMIT_MAX", 100u32)?,
                window_secs: parse_var("RATE_LIMIT_WINDOW_SECS", 3600u64)?,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

/// Fills the `<USERNAME>` and `<PASSWORD>` placeholders of a connection URL
pub fn substitute_credentials(url: &str, username: Option<&str>, password: Option<&str>) -> String {
    let mut url = url.to_string();
    if let Some(username) = username {
        url = url.replace("<USERNAME>", username);
    }
    if let Some(password) = password {
        url = url.replace("<PASSWORD>", password);
    }
    url
}
