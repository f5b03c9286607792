use std::env;
use std::time::Duration;

use dotenvy::dotenv;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. When absent the service falls back to the
    /// in-memory store, which loses all history on restart.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub port: u16,
    /// Upper bound on any single persistence-store call.
    pub store_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::Config("JWT_SECRET missing".into()))?;
        if jwt_secret.trim().is_empty() {
            return Err(AppError::Config("JWT_SECRET must not be empty".into()));
        }
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);
        let store_timeout_ms: u64 = env::var("STORE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5_000);

        Ok(Self {
            database_url,
            jwt_secret,
            port,
            store_timeout: Duration::from_millis(store_timeout_ms),
        })
    }

    /// Defaults for tests: in-memory store, fixed signing secret.
    pub fn test_defaults() -> Self {
        Self {
            database_url: None,
            jwt_secret: "test-secret".into(),
            port: 0,
            store_timeout: Duration::from_millis(2_000),
        }
    }
}
