//! Command line and environment configuration.
//!
//! Every option can be given as a flag or through the environment. A `.env` file in
//! the working directory is loaded before parsing, so it fills in anything the real
//! environment leaves unset.

use clap::{Parser, ValueEnum};
use std::{net::SocketAddr, time::Duration};

use crate::{error::StartupError, logging::LogConfig};

/// Connection strings with this scheme select the in-memory backend.
pub const MEMORY_SCHEME: &str = "memory://";

/// Default request body ceiling (50 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "docgate", version, about = "HTTP gateway exposing CRUD and query operations over MongoDB collections")]
pub struct Config {
    /// MongoDB connection string, or memory:// for an in-process store
    #[arg(long, env = "MONGODB_URI")]
    pub mongodb_uri: Option<String>,

    /// Database name (defaults to the one in the connection string, then "test")
    #[arg(long, env = "MONGODB_DATABASE")]
    pub database: Option<String>,

    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Maximum request body size in bytes
    #[arg(long, env = "BODY_LIMIT", default_value_t = DEFAULT_BODY_LIMIT)]
    pub body_limit: usize,

    /// Per-request database deadline in milliseconds
    #[arg(long, env = "DB_TIMEOUT_MS")]
    pub db_timeout_ms: Option<u64>,

    /// Log filter directive
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// The store the gateway is configured to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Memory,
    MongoDb {
        uri: String,
        database: Option<String>,
    },
}

impl Config {
    /// Loads `.env` (if present) and parses the process arguments.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Config::parse()
    }

    /// Resolves which backend to connect to.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::MissingConnectionString`] when no connection string is set.
    pub fn backend(&self) -> Result<BackendConfig, StartupError> {
        match self.mongodb_uri.as_deref().map(str::trim) {
            None | Some("") => Err(StartupError::MissingConnectionString),
            Some(uri) if uri.starts_with(MEMORY_SCHEME) => Ok(BackendConfig::Memory),
            Some(uri) => Ok(BackendConfig::MongoDb {
                uri: uri.to_string(),
                database: self.database.clone(),
            }),
        }
    }

    /// Address to bind the listener to.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if `host` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, StartupError> {
        let ip = self.host.parse().map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("invalid host {}: {e}", self.host))
        })?;

        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn db_timeout(&self) -> Option<Duration> {
        self.db_timeout_ms.map(Duration::from_millis)
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level.clone(),
            json_format: self.log_format == LogFormat::Json,
            ..LogConfig::default()
        }
    }
}
