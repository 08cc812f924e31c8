// Application configuration
// Read once at start-up from the environment (optionally seeded by .env)

use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::consumption::AllowancePolicy;

pub const DEFAULT_DAILY_LIMIT_GRAMS: u32 = 60;
pub const DEFAULT_WINDOW_HOURS: i32 = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),

    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime settings for the API process
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub default_daily_limit: Decimal,
    pub window_hours: i32,
    pub sweep_interval: Duration,
    pub policy_cache_ttl: Duration,
    pub db_max_connections: u32,
}

impl AppConfig {
    /// Build the configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any name-to-value lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let config = Self {
            database_url,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 8080)?,
            default_daily_limit: parse_or(
                &lookup,
                "DEFAULT_DAILY_LIMIT",
                Decimal::from(DEFAULT_DAILY_LIMIT_GRAMS),
            )?,
            window_hours: parse_or(&lookup, "WINDOW_HOURS", DEFAULT_WINDOW_HOURS)?,
            sweep_interval: Duration::from_secs(parse_or(&lookup, "RESET_SWEEP_INTERVAL_SECS", 3600)?),
            policy_cache_ttl: Duration::from_secs(parse_or(&lookup, "POLICY_CACHE_TTL_SECS", 60)?),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
        };

        config
            .default_policy()
            .validate()
            .map_err(|reason| ConfigError::Invalid {
                name: "DEFAULT_DAILY_LIMIT/WINDOW_HOURS",
                value: format!("{}/{}", config.default_daily_limit, config.window_hours),
                reason,
            })?;

        if config.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: "RESET_SWEEP_INTERVAL_SECS",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(config)
    }

    /// Policy written on first read when the store has none
    pub fn default_policy(&self) -> AllowancePolicy {
        AllowancePolicy::new(self.default_daily_limit, self.window_hours)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
