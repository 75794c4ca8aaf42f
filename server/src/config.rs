//! Configuration management for the server.

use ordo_engine::{ResolverConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_JITTER};
use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Upper bound of pooled connections
    pub database_max_connections: u32,
    /// Every request must carry a bearer token. The token is taken as the
    /// principal without verification, so this belongs behind a proxy that
    /// authenticates callers.
    pub require_auth: bool,
    /// Run the duplicate-position scan before serving
    pub scan_on_startup: bool,
    /// Total attempts for a position write that keeps colliding
    pub conflict_max_attempts: u32,
    /// Upper bound of the retry offset in milliseconds
    pub conflict_max_jitter_ms: i64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingDatabaseUrl)?;

        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            None => 10,
            Some(value) => match value.parse::<u32>() {
                Ok(max) if max >= 1 => max,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "DATABASE_MAX_CONNECTIONS",
                        value,
                    })
                }
            },
        };

        let require_auth = match lookup("REQUIRE_AUTH") {
            None => false,
            Some(value) => parse_bool(&value).ok_or(ConfigError::Invalid {
                key: "REQUIRE_AUTH",
                value,
            })?,
        };

        let scan_on_startup = match lookup("SCAN_ON_STARTUP") {
            None => true,
            Some(value) => parse_bool(&value).ok_or(ConfigError::Invalid {
                key: "SCAN_ON_STARTUP",
                value,
            })?,
        };

        let conflict_max_attempts = match lookup("CONFLICT_MAX_ATTEMPTS") {
            None => DEFAULT_MAX_ATTEMPTS,
            Some(value) => match value.parse::<u32>() {
                Ok(attempts) if attempts >= 1 => attempts,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "CONFLICT_MAX_ATTEMPTS",
                        value,
                    })
                }
            },
        };

        let conflict_max_jitter_ms = match lookup("CONFLICT_MAX_JITTER_MS") {
            None => DEFAULT_MAX_JITTER,
            Some(value) => match value.parse::<i64>() {
                Ok(jitter) if jitter >= 0 => jitter,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "CONFLICT_MAX_JITTER_MS",
                        value,
                    })
                }
            },
        };

        Ok(Self {
            host,
            port,
            database_url,
            database_max_connections,
            require_auth,
            scan_on_startup,
            conflict_max_attempts,
            conflict_max_jitter_ms,
        })
    }

    /// Retry policy handed to the ordering engine.
    pub fn resolver(&self) -> ResolverConfig {
        ResolverConfig {
            max_attempts: self.conflict_max_attempts,
            max_jitter: self.conflict_max_jitter_ms,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid {key} value: {value}")]
    Invalid { key: &'static str, value: String },
}
