//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address.
    pub addr: SocketAddr,
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Load the demo catalog into an empty database.
    pub seed_demo: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `LUNADINE_ADDR` | Server bind address | `127.0.0.1:8080` |
    /// | `LUNADINE_DB_PATH` | SQLite database file | `lunadine.db` |
    /// | `LUNADINE_SEED_DEMO` | Seed demo data (`1`/`true`) | `false` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("LUNADINE_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let db_path = env::var("LUNADINE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("lunadine.db"));

        let seed_demo = match env::var("LUNADINE_SEED_DEMO") {
            Ok(value) => parse_flag(&value).ok_or(ConfigError::InvalidFlag(value))?,
            Err(_) => false,
        };

        Ok(Self {
            addr,
            db_path,
            seed_demo,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid LUNADINE_ADDR format")]
    InvalidAddr,

    #[error("Invalid LUNADINE_SEED_DEMO value: {0}")]
    InvalidFlag(String),
}
