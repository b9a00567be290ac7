//! Configuration for the MangoKV server.
//!
//! Settings come from command-line arguments and an optional TOML file.
//! CLI arguments take precedence over the file, which takes precedence over
//! the built-in defaults.

use crate::connection::DEFAULT_MAX_LINE_LENGTH;
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default time to wait for open connections when shutting down
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// Command-line arguments for the server
#[derive(Parser, Debug, Default)]
#[command(name = "mangokv-server")]
#[command(version)]
#[command(about = "An in-memory key-value store with a line-oriented TCP protocol", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to (default: 127.0.0.1)
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Port to listen on (default: 8080)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Number of worker threads (defaults to number of CPU cores)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Longest accepted request line in bytes
    #[arg(long)]
    pub max_line_length: Option<usize>,

    /// Seconds to wait for open connections on shutdown
    #[arg(long)]
    pub shutdown_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
            max_line_length: default_max_line_length(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}

fn default_shutdown_timeout() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub max_line_length: usize,
    pub shutdown_timeout: Duration,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::merge(CliArgs::default(), TomlConfig::default())
    }
}

impl Config {
    /// Load configuration from the process arguments and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    /// Resolve already-parsed CLI arguments, reading the TOML file they name.
    pub fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = match cli.config {
            Some(ref path) => {
                let contents = std::fs::read_to_string(path).map_err(|source| {
                    ConfigError::FileRead {
                        path: path.clone(),
                        source,
                    }
                })?;
                toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
                    path: path.clone(),
                    source,
                })?
            }
            None => TomlConfig::default(),
        };

        let config = Self::merge(cli, toml_config);
        config.validate()?;
        Ok(config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence).
    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        let server = toml_config.server;

        Config {
            host: cli.host.unwrap_or(server.host),
            port: cli.port.unwrap_or(server.port),
            workers: cli.workers.or(server.workers),
            max_line_length: cli.max_line_length.unwrap_or(server.max_line_length),
            shutdown_timeout: Duration::from_secs(
                cli.shutdown_timeout.unwrap_or(server.shutdown_timeout),
            ),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        }
    }

    /// Rejects settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.max_line_length == 0 {
            return Err(ConfigError::Invalid(
                "max_line_length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{}': {source}", path.display())]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
