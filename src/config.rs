//! Environment configuration for the service binary and the client core.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid { key: &'static str, value: String, reason: String },
}

fn invalid(key: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid { key, value: value.to_string(), reason: reason.to_string() }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "expected true or false")),
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub nats_url: Option<String>,
    pub seed_catalog: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `BIND_ADDR` wins over `PORT`; the default is `0.0.0.0:8083`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = match (lookup("BIND_ADDR"), lookup("PORT")) {
            (Some(addr), _) => addr.parse().map_err(|e| invalid("BIND_ADDR", &addr, e))?,
            (None, Some(port)) => {
                let port: u16 = port.parse().map_err(|e| invalid("PORT", &port, e))?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
            (None, None) => SocketAddr::from(([0, 0, 0, 0], 8083)),
        };
        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v.parse().map_err(|e| invalid("DATABASE_MAX_CONNECTIONS", &v, e))?,
            None => 10,
        };
        let seed_catalog = match lookup("SEED_CATALOG") {
            Some(v) => parse_bool("SEED_CATALOG", &v)?,
            None => true,
        };
        Ok(Self {
            bind_addr,
            database_url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            max_connections,
            nats_url: lookup("NATS_URL").filter(|v| !v.is_empty()),
            seed_catalog,
        })
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub state_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { base_url: "http://127.0.0.1:8083".into(), request_timeout: Duration::from_secs(10), state_dir: None }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let request_timeout = match lookup("STOREFRONT_TIMEOUT_SECS") {
            Some(v) => {
                let secs: u64 = v.parse().map_err(|e| invalid("STOREFRONT_TIMEOUT_SECS", &v, e))?;
                if secs == 0 { return Err(invalid("STOREFRONT_TIMEOUT_SECS", &v, "must be positive")); }
                Duration::from_secs(secs)
            }
            None => defaults.request_timeout,
        };
        Ok(Self {
            base_url: lookup("STOREFRONT_API_URL").map(|u| u.trim_end_matches('/').to_string()).unwrap_or(defaults.base_url),
            request_timeout,
            state_dir: lookup("STOREFRONT_STATE_DIR").map(PathBuf::from),
        })
    }

    /// The anonymous session id and login live in this file.
    pub fn state_file(&self) -> Option<PathBuf> {
        self.state_dir.as_ref().map(|dir| dir.join("storefront-session.json"))
    }
}
