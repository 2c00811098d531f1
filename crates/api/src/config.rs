//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::StaticDiscounts;
use thiserror::Error;

/// Returned when an environment variable holds an unusable value.
#[derive(Debug, Error)]
#[error("invalid value for {key}: '{value}' ({reason})")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — PostgreSQL URL; unset keeps everything in memory
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `10`)
/// - `DISCOUNT_SERVICE_URL` — base URL of the discount service; unset uses
///   the static table
/// - `DISCOUNT_TIMEOUT_MS` — discount request timeout (default: `500`)
/// - `DISCOUNTS` — static table, `category=percent,...` (default: empty)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub discount_service_url: Option<String>,
    pub discount_timeout: Duration,
    pub static_discounts: StaticDiscounts,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "PORT")?.unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: non_empty("DATABASE_URL"),
            database_max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(defaults.database_max_connections),
            discount_service_url: non_empty("DISCOUNT_SERVICE_URL"),
            discount_timeout: parse(&lookup, "DISCOUNT_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.discount_timeout),
            static_discounts: parse(&lookup, "DISCOUNTS")?.unwrap_or(defaults.static_discounts),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ConfigError {
                    key,
                    reason: e.to_string(),
                    value,
                })
        }
        _ => Ok(None),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            discount_service_url: None,
            discount_timeout: Duration::from_millis(500),
            static_discounts: StaticDiscounts::new(),
        }
    }
}
