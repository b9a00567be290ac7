//! Storage Engine Module
//!
//! This module provides the single source of truth for MangoKV: a
//! thread-safe, sharded in-memory map from key to value.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Sharded Storage**: 64 independent shards reduce lock contention
//! - **RwLock**: Multiple concurrent readers, exclusive writers
//! - **Reserved Values**: the tombstone token can never be stored
//!
//! ## Example
//!
//! ```
//! use mangokv::storage::{StorageEngine, StorageError, TOMBSTONE};
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(StorageEngine::new());
//!
//! engine.put(Bytes::from("key1"), Bytes::from("value1")).unwrap();
//! assert_eq!(engine.get(b"key1"), Some(Bytes::from("value1")));
//!
//! let err = engine
//!     .put(Bytes::from("key1"), Bytes::from_static(TOMBSTONE))
//!     .unwrap_err();
//! assert!(matches!(err, StorageError::ReservedValue(_)));
//! ```

pub mod engine;

// Re-export commonly used types
pub use engine::{StorageEngine, StorageError, StorageResult, StorageStats, TOMBSTONE};
