//! # MangoKV - An In-Memory Key-Value Store
//!
//! MangoKV keeps string keys and values in memory and serves them over a
//! line-oriented TCP protocol. Every request is a single `\n`-terminated
//! line and gets exactly one reply line.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              MangoKV                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └──────┬──────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │         │                  │                  │                         │
//! │         │ shutdown         │ parse            ▼                         │
//! │         │ (watch)          ▼         ┌──────────────────────────────┐   │
//! │         └──────────> ┌───────────┐   │        StorageEngine         │   │
//! │                      │   Line    │   │ ┌───────┐ ┌───────┐ ┌──────┐ │   │
//! │                      │  Parser   │   │ │Shard 0│ │Shard 1│ │...N  │ │   │
//! │                      └───────────┘   │ │RwLock │ │RwLock │ │      │ │   │
//! │                                      │ └───────┘ └───────┘ └──────┘ │   │
//! │                                      └──────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use mangokv::{Config, Server, StorageEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mangokv::server::ServerError> {
//!     let config = Config::default();
//!     let server = Server::bind(&config, Arc::new(StorageEngine::new())).await?;
//!
//!     server
//!         .run(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await;
//!     Ok(())
//! }
//! ```
//!
//! ## Protocol
//!
//! - `PUT key value` replies `OK`, or `RESERVED KEYWORD value` when the value
//!   is `__TOMBSTONE__`
//! - `GET key` replies with the value or `NOT FOUND`
//! - `DELETE key` replies `OK` or `NOT FOUND`
//! - Anything else replies `INVALID INPUT`; the connection stays open
//!
//! ## Module Overview
//!
//! - [`protocol`]: request line parser and reply types
//! - [`storage`]: thread-safe sharded store
//! - [`commands`]: executes requests against the store
//! - [`connection`]: per-client read/execute/reply loop
//! - [`server`]: TCP listener with graceful shutdown
//! - [`config`]: CLI and TOML configuration
//! - [`client`]: async client library

pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use client::{Client, ClientError};
pub use commands::CommandHandler;
pub use config::{Config, ConfigError};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{Command, ParseError, Reply};
pub use server::{Server, ServerError};
pub use storage::{StorageEngine, StorageError, TOMBSTONE};

/// The default port MangoKV listens on
pub const DEFAULT_PORT: u16 = 8080;

/// The default host MangoKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of MangoKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
