//! Local caching module for offline data access.
//!
//! Cached payloads are stored as `{data, timestamp}` JSON blobs in an
//! injected `KeyValueStore` and are discarded once older than 24 hours or
//! unreadable.

pub mod manager;
pub mod store;

pub use manager::{CacheManager, CacheRecord, DEFAULT_ROSTER_KEY, FRESHNESS_WINDOW_HOURS};
pub use store::{FileStore, KeyValueStore, MemoryStore};
