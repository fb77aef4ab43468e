//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use classroom_core::domain::{Caller, Role};
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;
use uuid::Uuid;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where lectures and questions are persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Process-local storage; everything is lost on restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("'{}' is not one of: postgres, memory", other)),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub log_level: Level,
    pub frontend_url: String,
    /// Tokens the `memory` backend accepts, since it has no user table to
    /// resolve credentials against. Ignored by `postgres`.
    pub memory_tokens: Vec<(String, Caller)>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:5001".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let frontend_url =
            lookup("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Storage Settings ---
        let storage = match lookup("STORAGE_BACKEND") {
            Some(raw) => raw
                .parse::<StorageBackend>()
                .map_err(|e| ConfigError::InvalidValue("STORAGE_BACKEND".to_string(), e))?,
            None => StorageBackend::Postgres,
        };

        let database_url = lookup("DATABASE_URL");
        if storage == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingVar("DATABASE_URL".to_string()));
        }

        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.parse::<u32>().map_err(|e| {
                ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS".to_string(), e.to_string())
            })?,
            None => 5,
        };

        let memory_tokens = match lookup("MEMORY_TOKENS") {
            Some(raw) => parse_memory_tokens(&raw)
                .map_err(|e| ConfigError::InvalidValue("MEMORY_TOKENS".to_string(), e))?,
            None => Vec::new(),
        };

        Ok(Self {
            bind_address,
            storage,
            database_url,
            database_max_connections,
            log_level,
            frontend_url,
            memory_tokens,
        })
    }
}

/// Parses `token=role:user_id` entries separated by commas, e.g.
/// `t1=teacher:6f1c...,s1=student:9a0e...`.
fn parse_memory_tokens(raw: &str) -> Result<Vec<(String, Caller)>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (token, identity) = entry
                .split_once('=')
                .ok_or_else(|| format!("'{}' is not token=role:user_id", entry))?;
            let (role, user_id) = identity
                .split_once(':')
                .ok_or_else(|| format!("'{}' is not token=role:user_id", entry))?;
            let token = token.trim();
            if token.is_empty() {
                return Err(format!("'{}' has an empty token", entry));
            }
            let role: Role = role.trim().parse()?;
            let user_id = Uuid::parse_str(user_id.trim()).map_err(|e| e.to_string())?;
            Ok((token.to_string(), Caller { user_id, role }))
        })
        .collect()
}
