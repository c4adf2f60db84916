//! Configuration for the swim school backend.
//!
//! Loaded from `SWIM_*` environment variables, with a `.env` file honoured in development.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::AppError;

const DEFAULT_DB_PATH: &str = "./data/swimschool.sqlite";
const DEFAULT_INDEX_PATH: &str = "./data/index";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Operator key for the `/api` routes; unset disables authentication
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to the participant search index directory
    pub index_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("SWIM_API_PSK").ok().filter(|k| !k.is_empty());

        let db_path = env::var("SWIM_DB_PATH")
            .unwrap_or_else(|_| DEFAULT_DB_PATH.to_string())
            .into();

        let index_path = env::var("SWIM_INDEX_PATH")
            .unwrap_or_else(|_| DEFAULT_INDEX_PATH.to_string())
            .into();

        let raw_addr = env::var("SWIM_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr.parse().map_err(|e| {
            AppError::Internal(format!("Invalid SWIM_BIND_ADDR '{}': {}", raw_addr, e))
        })?;

        let log_level = env::var("SWIM_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            api_psk,
            db_path,
            index_path,
            bind_addr,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases live in one test: they mutate the same process environment.
    #[test]
    fn test_env_config() {
        env::remove_var("SWIM_API_PSK");
        env::remove_var("SWIM_DB_PATH");
        env::remove_var("SWIM_INDEX_PATH");
        env::remove_var("SWIM_BIND_ADDR");
        env::remove_var("SWIM_LOG_LEVEL");

        let config = Config::from_env().unwrap();

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.index_path, PathBuf::from(DEFAULT_INDEX_PATH));
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.log_level, "info");

        env::set_var("SWIM_BIND_ADDR", "not-an-address");
        let err = Config::from_env().unwrap_err();
        assert!(err.message().contains("SWIM_BIND_ADDR"));
        env::remove_var("SWIM_BIND_ADDR");
    }
}
