//! Key/value substrates for the search cache.
//!
//! A substrate is a flat string→string store that may be shared with
//! unrelated data; [`SearchCache`](super::SearchCache) namespaces its keys
//! and owns all TTL logic. Substrates only move bytes and may fail.

use std::future::Future;

use moka::future::Cache as MokaCache;

use super::CacheConfig;

/// Errors from a storage substrate.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the backing medium failed
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing medium holds data that cannot be decoded
    #[error("storage corrupted: {message}")]
    Corrupt { message: String },

    /// The value does not fit in the store
    #[error("storage quota exceeded: {size} bytes (limit {limit})")]
    QuotaExceeded { size: usize, limit: usize },
}

/// A flat, fallible key/value store.
pub trait CacheStorage: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: String)
    -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Delete a value. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// All keys currently stored, including other namespaces'.
    fn keys(&self) -> impl Future<Output = Result<Vec<String>, StorageError>> + Send;
}

/// In-memory substrate backed by a bounded moka cache.
///
/// Moka only bounds capacity here; expiry is decided by the search cache so
/// that expired entries stay visible to `stats()` until they are read.
#[derive(Clone)]
pub struct MemoryStorage {
    entries: MokaCache<String, String>,
    max_value_bytes: Option<usize>,
}

impl MemoryStorage {
    /// Create a store holding at most `max_capacity` entries.
    pub fn new(max_capacity: u64) -> Self {
        Self {
            entries: MokaCache::builder().max_capacity(max_capacity).build(),
            max_value_bytes: None,
        }
    }

    /// Create a store sized from a cache configuration.
    pub fn with_config(config: &CacheConfig) -> Self {
        Self::new(config.max_capacity)
    }

    /// Reject values larger than `limit` bytes, like a browser storage quota.
    pub fn with_max_value_bytes(mut self, limit: usize) -> Self {
        self.max_value_bytes = Some(limit);
        self
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::with_config(&CacheConfig::default())
    }
}

impl CacheStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).await)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        if let Some(limit) = self.max_value_bytes
            && value.len() > limit
        {
            return Err(StorageError::QuotaExceeded {
                size: value.len(),
                limit,
            });
        }
        self.entries.insert(key.to_string(), value).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.invalidate(key).await;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .entries
            .iter()
            .map(|(key, _)| key.as_ref().clone())
            .collect())
    }
}
