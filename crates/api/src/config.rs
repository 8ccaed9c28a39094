//! API process configuration.

use std::env;
use std::time::Duration;

/// Load-time configuration for the HTTP surface. All values are constants
/// for the process lifetime; there is no hot reload.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen address.
    pub addr: String,

    /// Postgres URL.
    pub database_url: String,

    /// Connection pool size. Keep at 1 in serverless environments.
    pub database_pool_size: u32,

    /// HMAC secret for verifying bearer tokens.
    pub jwt_secret: String,

    /// Request-level timeout for identify.
    pub identify_timeout: Duration,

    /// Request-level timeout for health assessment.
    pub assess_timeout: Duration,

    /// Request-level timeout for non-streaming chat.
    pub chat_timeout: Duration,

    /// Request-level timeout for streaming chat.
    pub chat_stream_timeout: Duration,
}

impl AppConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `DATABASE_URL` - Postgres connection string
    /// - `AUTH_JWT_SECRET` - bearer token verification secret
    ///
    /// Optional environment variables:
    /// - `VERDANT_API_ADDR` - listen address (default: 127.0.0.1:8080)
    /// - `DATABASE_POOL_SIZE` - pool size (default: 5)
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL not set".to_string())?;
        let jwt_secret =
            env::var("AUTH_JWT_SECRET").map_err(|_| "AUTH_JWT_SECRET not set".to_string())?;

        Ok(Self {
            addr: env::var("VERDANT_API_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            database_url,
            database_pool_size: env::var("DATABASE_POOL_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            jwt_secret,
            identify_timeout: Duration::from_secs(30),
            assess_timeout: Duration::from_secs(15),
            chat_timeout: Duration::from_secs(30),
            chat_stream_timeout: Duration::from_secs(60),
        })
    }
}
