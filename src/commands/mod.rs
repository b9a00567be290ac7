//! Command Handler Module
//!
//! This module implements the command execution layer for MangoKV.
//! It receives parsed commands, executes them against the storage engine,
//! and returns the reply for the client.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Line Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `PUT key value`
//! - `GET key`
//! - `DELETE key`

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;
