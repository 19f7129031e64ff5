//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono::Duration;
use crm_dashboard_core::RateLimitPolicy;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

const MAX_SESSION_TTL_DAYS: i64 = 365;
const MAX_RATE_LIMIT_SECS: i64 = 7 * 24 * 60 * 60;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cors_origin: String,
    pub session_ttl: Duration,
    pub rate_limit: RateLimitPolicy,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, falling back to defaults
    /// for everything except `DATABASE_URL`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:3000".parse::<SocketAddr>())?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Session and Login Policy ---
        let session_ttl_days: i64 = parse_or(&lookup, "SESSION_TTL_DAYS", Ok(30))?;
        let max_attempts: u32 = parse_or(&lookup, "RATE_LIMIT_MAX_ATTEMPTS", Ok(5))?;
        let window_secs: i64 = parse_or(&lookup, "RATE_LIMIT_WINDOW_SECS", Ok(5 * 60))?;
        let block_secs: i64 = parse_or(&lookup, "RATE_LIMIT_BLOCK_SECS", Ok(15 * 60))?;

        let session_ttl = bounded(
            "SESSION_TTL_DAYS",
            session_ttl_days,
            MAX_SESSION_TTL_DAYS,
            Duration::try_days,
        )?;
        let window = bounded(
            "RATE_LIMIT_WINDOW_SECS",
            window_secs,
            MAX_RATE_LIMIT_SECS,
            Duration::try_seconds,
        )?;
        let block_duration = bounded(
            "RATE_LIMIT_BLOCK_SECS",
            block_secs,
            MAX_RATE_LIMIT_SECS,
            Duration::try_seconds,
        )?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_MAX_ATTEMPTS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            session_ttl,
            rate_limit: RateLimitPolicy {
                max_attempts,
                window,
                block_duration,
            },
        })
    }
}

// Accepts `value` in `1..=max` and converts it with `to_duration`.
fn bounded(
    key: &str,
    value: i64,
    max: i64,
    to_duration: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError> {
    if !(1..=max).contains(&value) {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be between 1 and {max}"),
        ));
    }
    to_duration(value)
        .ok_or_else(|| ConfigError::InvalidValue(key.to_string(), "out of range".to_string()))
}

fn parse_or<F, T>(
    lookup: &F,
    key: &str,
    default: Result<T, T::Err>,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let parsed = match lookup(key) {
        Some(raw) => raw.trim().parse::<T>(),
        None => default,
    };
    parsed.map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}
