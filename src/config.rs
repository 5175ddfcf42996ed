use std::env;

use chrono::Duration;
use thiserror::Error;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_JWT_SECRET: &str = "secret";
const DEFAULT_JWT_EXPIRATION_DAYS: i64 = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub server_host: String,
    pub jwt_secret: String,
    pub jwt_expiration: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any name → value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let server_port = match lookup("SERVER_PORT") {
            Some(port) => port.parse().map_err(|_| ConfigError::Invalid {
                name: "SERVER_PORT",
                expected: "a port number",
                value: port,
            })?,
            None => DEFAULT_PORT,
        };

        let jwt_expiration_days = match lookup("JWT_EXPIRATION_DAYS") {
            Some(days) => match days.parse::<i64>() {
                Ok(days) if days > 0 => days,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "JWT_EXPIRATION_DAYS",
                        expected: "a positive number of days",
                        value: days,
                    })
                }
            },
            None => DEFAULT_JWT_EXPIRATION_DAYS,
        };

        Ok(Self {
            database_url,
            server_port,
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            jwt_secret: lookup("JWT_SECRET").unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string()),
            jwt_expiration: Duration::days(jwt_expiration_days),
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}
