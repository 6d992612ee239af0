//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on missing or malformed values.
//! The database URL is wrapped in `secrecy::SecretString` so it never ends
//! up in logs.

use std::str::FromStr;
use std::time::Duration;

use crate::db::DEFAULT_MAX_CONNECTIONS;
use crate::error::{Error, Result};
use secrecy::SecretString;

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub max_connections: u32,
    /// Number of worker loops started by `serve`.
    pub workers: usize,
    pub poll_interval: Duration,
    /// Bounds of the simulated unit of work.
    pub work_min: Duration,
    pub work_max: Duration,
    /// How long `serve` waits for the pool to drain on shutdown.
    pub shutdown_grace: Duration,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            max_connections: parsed_var("DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            workers: parsed_var("WORKER_COUNT", 3)?,
            poll_interval: Duration::from_millis(parsed_var("POLL_INTERVAL_MS", 1000)?),
            work_min: Duration::from_millis(parsed_var("WORK_MIN_MS", 2000)?),
            work_max: Duration::from_millis(parsed_var("WORK_MAX_MS", 4000)?),
            shutdown_grace: Duration::from_secs(parsed_var("SHUTDOWN_GRACE_SECS", 10)?),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("WORKER_COUNT must be at least 1".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Config("POLL_INTERVAL_MS must be positive".to_string()));
        }
        if self.work_min > self.work_max {
            return Err(Error::Config(format!(
                "WORK_MIN_MS ({}) exceeds WORK_MAX_MS ({})",
                self.work_min.as_millis(),
                self.work_max.as_millis()
            )));
        }
        Ok(())
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{name} has invalid value {raw:?}")))
}
