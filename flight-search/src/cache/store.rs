//! TTL cache of completed search results.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::domain::{CacheKey, Flight};

use super::storage::CacheStorage;

/// Configuration for the search cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry stays valid after it is written.
    pub ttl: Duration,

    /// Key prefix separating cache entries from unrelated data in a shared
    /// substrate.
    pub namespace: String,

    /// Maximum number of entries for bounded substrates.
    pub max_capacity: u64,
}

impl CacheConfig {
    /// Set a custom TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set a custom namespace prefix.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the capacity of bounded substrates.
    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            namespace: "flight_cache:".to_string(),
            max_capacity: 1000,
        }
    }
}

/// The flights observed during one completed search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSnapshot {
    pub flights: Vec<Flight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
}

impl SearchSnapshot {
    pub fn new(flights: Vec<Flight>) -> Self {
        Self {
            flights,
            data_source: None,
        }
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}

/// A stored snapshot with its write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: SearchSnapshot,
    pub timestamp: DateTime<Utc>,
}

/// Entry counts partitioned by the TTL rule at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
}

/// Search-result cache over a namespaced key/value substrate.
///
/// The cache is an optimization only: every substrate failure is logged and
/// degrades to a miss or a no-op, never to an error for the caller.
pub struct SearchCache<S> {
    storage: S,
    config: CacheConfig,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl<S: CacheStorage> SearchCache<S> {
    /// Create a cache reading the system clock.
    pub fn new(storage: S, config: CacheConfig) -> Self {
        Self::with_clock(storage, config, Arc::new(SystemClock))
    }

    /// Create a cache reading the given clock.
    pub fn with_clock(storage: S, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let ttl = TimeDelta::from_std(config.ttl).unwrap_or(TimeDelta::MAX);
        Self {
            storage,
            config,
            ttl,
            clock,
        }
    }

    fn storage_key(&self, key: &CacheKey) -> String {
        format!("{}{}", self.config.namespace, key)
    }

    fn is_valid(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.timestamp) < self.ttl
    }

    /// Look up a snapshot.
    ///
    /// Returns `None` for missing, unreadable or expired entries. Expired and
    /// unreadable entries are removed as a side effect.
    pub async fn get(&self, key: &CacheKey) -> Option<SearchSnapshot> {
        let storage_key = self.storage_key(key);

        let raw = match self.storage.get(&storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(%key, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(%key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(%key, error = %e, "discarding undecodable cache entry");
                self.remove_quietly(&storage_key).await;
                return None;
            }
        };

        if !self.is_valid(&entry, self.clock.now()) {
            debug!(%key, written = %entry.timestamp, "cache entry expired");
            self.remove_quietly(&storage_key).await;
            return None;
        }

        debug!(%key, flights = entry.data.len(), "cache hit");
        Some(entry.data)
    }

    /// Store a snapshot, replacing any previous entry for `key`.
    pub async fn set(&self, key: &CacheKey, data: &SearchSnapshot) {
        let entry = CacheEntry {
            data: data.clone(),
            timestamp: self.clock.now(),
        };

        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%key, error = %e, "failed to encode cache entry");
                return;
            }
        };

        match self.storage.set(&self.storage_key(key), raw).await {
            Ok(()) => debug!(%key, flights = data.len(), "cached search results"),
            Err(e) => warn!(%key, error = %e, "cache write failed, continuing uncached"),
        }
    }

    /// Remove every entry in this cache's namespace.
    ///
    /// Keys outside the namespace are left alone.
    pub async fn clear(&self) {
        let keys = match self.storage.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "cache clear failed to list keys");
                return;
            }
        };

        for key in keys
            .into_iter()
            .filter(|k| k.starts_with(&self.config.namespace))
        {
            self.remove_quietly(&key).await;
        }
    }

    /// Partition the namespace's entries into valid and expired.
    ///
    /// Entries that cannot be decoded count as expired.
    pub async fn stats(&self) -> CacheStats {
        let keys = match self.storage.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "cache stats failed to list keys");
                return CacheStats::default();
            }
        };

        let now = self.clock.now();
        let mut stats = CacheStats::default();

        for key in keys
            .iter()
            .filter(|k| k.starts_with(&self.config.namespace))
        {
            let entry = match self.storage.get(key).await {
                Ok(Some(raw)) => serde_json::from_str::<CacheEntry>(&raw).ok(),
                // Vanished between listing and reading
                Ok(None) => continue,
                Err(_) => None,
            };

            stats.total += 1;
            match entry {
                Some(entry) if self.is_valid(&entry, now) => stats.valid += 1,
                _ => stats.expired += 1,
            }
        }

        stats
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Access the underlying substrate.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    async fn remove_quietly(&self, storage_key: &str) {
        if let Err(e) = self.storage.remove(storage_key).await {
            warn!(key = storage_key, error = %e, "cache remove failed");
        }
    }
}
