//! Caching layer for completed searches.
//!
//! A completed search is cached as one [`SearchSnapshot`] under the
//! request's [`CacheKey`](crate::domain::CacheKey) for one hour. Entries are
//! written once, atomically, when a search completes, so readers see either
//! a whole snapshot or nothing.
//!
//! The substrate is pluggable ([`CacheStorage`]): a bounded in-memory store
//! or a JSON file that persists across restarts.

mod file;
mod storage;
mod store;

pub use file::FileStorage;
pub use storage::{CacheStorage, MemoryStorage, StorageError};
pub use store::{CacheConfig, CacheEntry, CacheStats, SearchCache, SearchSnapshot};
