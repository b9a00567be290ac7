//! Thread-Safe Storage Engine
//!
//! This module implements the core storage engine for MangoKV.
//! It is a concurrent string-to-string map shared by every client connection.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Instead of one big lock, keys are spread over shards so
//!    unrelated keys never contend.
//! 2. **Whole-operation locking**: every operation holds its key's shard lock
//!    from start to finish, so a PUT or DELETE is atomic to concurrent GETs.
//! 3. **No tombstones**: DELETE removes the mapping outright. The tombstone
//!    token is reserved and rejected on write.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use bytes::Bytes;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Number of shards for the storage engine.
const NUM_SHARDS: usize = 64;

/// The value clients are never allowed to store.
pub const TOMBSTONE: &[u8] = b"__TOMBSTONE__";

/// Errors returned by storage operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The client tried to store the reserved tombstone token.
    #[error("{} is a reserved keyword", String::from_utf8_lossy(.0))]
    ReservedValue(Bytes),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// A single shard containing a portion of the key-value pairs.
#[derive(Debug, Default)]
struct Shard {
    data: RwLock<HashMap<Bytes, Bytes>>,
}

impl Shard {
    // A panicking writer cannot leave a half-applied insert or remove behind,
    // so a poisoned map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<Bytes, Bytes>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Bytes, Bytes>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time counters describing storage activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of live keys
    pub keys: u64,
    /// Total GET operations
    pub get_ops: u64,
    /// Total successful PUT operations
    pub put_ops: u64,
    /// Total DELETE operations (hits and misses)
    pub del_ops: u64,
    /// PUTs rejected because the value was reserved
    pub rejected_puts: u64,
}

/// The main storage engine for MangoKV.
///
/// This struct is designed to be wrapped in an `Arc` and shared across
/// all connection tasks. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use mangokv::storage::StorageEngine;
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
///
/// engine.put(Bytes::from("name"), Bytes::from("mango")).unwrap();
/// assert_eq!(engine.get(b"name"), Some(Bytes::from("mango")));
///
/// assert!(engine.delete(b"name"));
/// assert!(!engine.delete(b"name"));
/// ```
pub struct StorageEngine {
    shards: Vec<Shard>,
    key_count: AtomicU64,
    get_count: AtomicU64,
    put_count: AtomicU64,
    del_count: AtomicU64,
    rejected_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates an empty storage engine.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::default()).collect();

        Self {
            shards,
            key_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            put_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            rejected_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    #[inline]
    fn get_shard(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Stores `value` under `key`, overwriting any previous value.
    ///
    /// Returns `true` if a new key was created and `false` if an existing
    /// key was updated. Storing the tombstone token fails with
    /// [`StorageError::ReservedValue`] and leaves the map untouched.
    pub fn put(&self, key: Bytes, value: Bytes) -> StorageResult<bool> {
        if value.as_ref() == TOMBSTONE {
            self.rejected_count.fetch_add(1, Ordering::Relaxed);
            return Err(StorageError::ReservedValue(value));
        }

        self.put_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.get_shard(&key);
        let mut data = shard.write();

        let is_new = data.insert(key, value).is_none();
        if is_new {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }

        Ok(is_new)
    }

    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.get_shard(key);
        let data = shard.read();
        data.get(key).cloned()
    }

    /// Removes `key`.
    ///
    /// Returns `true` if the key existed. The presence check and the removal
    /// happen under the same write lock.
    pub fn delete(&self, key: &[u8]) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.get_shard(key);
        let mut data = shard.write();

        if data.remove(key).is_some() {
            self.key_count.fetch_sub(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Returns the number of keys in the store.
    ///
    /// This is an approximation under concurrent writes because it uses
    /// relaxed atomic ordering.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    /// Returns true if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the storage counters.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.key_count.load(Ordering::Relaxed),
            get_ops: self.get_count.load(Ordering::Relaxed),
            put_ops: self.put_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            rejected_puts: self.rejected_count.load(Ordering::Relaxed),
        }
    }
}
