/// Runtime configuration read from the environment (and `.env` when present).
use crate::shared::errors::{AppError, AppResult};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "mangaq.db";
const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5000";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_RENUMBER_THRESHOLD: f64 = 1_000_000.0;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_address: SocketAddr,
    pub poll_interval: Duration,
    /// Pending order keys are renumbered once their magnitude passes this value.
    pub renumber_threshold: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            bind_address: DEFAULT_BIND_ADDRESS
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 5000))),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            renumber_threshold: DEFAULT_RENUMBER_THRESHOLD,
        }
    }
}

impl AppConfig {
    /// Load configuration, falling back to defaults for unset variables
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (used by tests)
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = match lookup("DATABASE_URL") {
            Some(url) => Self::validate_database_url(url)?,
            None => defaults.database_url,
        };

        let bind_address = match lookup("BIND_ADDRESS") {
            Some(addr) => addr.parse().map_err(|e| {
                AppError::ConfigError(format!("Invalid BIND_ADDRESS '{}': {}", addr, e))
            })?,
            None => defaults.bind_address,
        };

        let poll_interval = match lookup("WORKER_POLL_INTERVAL_MS") {
            Some(ms) => {
                let ms: u64 = ms.trim().parse()?;
                if ms == 0 {
                    return Err(AppError::ConfigError(
                        "WORKER_POLL_INTERVAL_MS must be greater than zero".to_string(),
                    ));
                }
                Duration::from_millis(ms)
            }
            None => defaults.poll_interval,
        };

        let renumber_threshold = match lookup("ORDER_KEY_RENUMBER_THRESHOLD") {
            Some(value) => {
                let threshold: f64 = value.trim().parse()?;
                if !threshold.is_finite() || threshold <= 0.0 {
                    return Err(AppError::ConfigError(
                        "ORDER_KEY_RENUMBER_THRESHOLD must be a positive number".to_string(),
                    ));
                }
                threshold
            }
            None => defaults.renumber_threshold,
        };

        Ok(Self {
            database_url,
            bind_address,
            poll_interval,
            renumber_threshold,
        })
    }

    /// The queue runs on SQLite; reject URLs meant for a server database
    fn validate_database_url(url: String) -> AppResult<String> {
        let url = url.trim().to_string();
        if url.is_empty() {
            return Err(AppError::ConfigError(
                "DATABASE_URL cannot be empty".to_string(),
            ));
        }
        if url.starts_with("postgres://")
            || url.starts_with("postgresql://")
            || url.starts_with("mysql://")
        {
            return Err(AppError::ConfigError(
                "DATABASE_URL must point to a SQLite database file".to_string(),
            ));
        }
        Ok(url.trim_start_matches("sqlite://").to_string())
    }
}
