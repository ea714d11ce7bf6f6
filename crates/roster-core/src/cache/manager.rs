use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::KeyValueStore;
use crate::api::SourceError;
use crate::models::RosterEntry;

/// Cached data older than this is discarded.
pub const FRESHNESS_WINDOW_HOURS: i64 = 24;

const FRESHNESS_WINDOW_MS: i64 = FRESHNESS_WINDOW_HOURS * 3_600_000;

/// Store key for the contact roster.
pub const DEFAULT_ROSTER_KEY: &str = "contactsData";

/// A cached payload with its write time in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord<T> {
    pub data: T,
    pub timestamp: i64,
}

impl<T> CacheRecord<T> {
    pub fn new(data: T, now: DateTime<Utc>) -> Self {
        Self {
            data,
            timestamp: now.timestamp_millis(),
        }
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.timestamp)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Age in whole milliseconds, on the same scale as `timestamp`.
    pub fn age_millis(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp_millis() - self.timestamp
    }

    /// Stale strictly after the window; a record exactly 24h old is fresh.
    /// Timestamps in the future (clock skew) count as fresh.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.age_millis(now) > FRESHNESS_WINDOW_MS
    }

    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        let minutes = self.age_millis(now) / 60_000;
        if minutes < 1 {
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

/// Typed, freshness-aware access to a `KeyValueStore`.
/// Clone is cheap - the store is shared.
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn KeyValueStore>,
    roster_key: String,
}

impl CacheManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_roster_key(store, DEFAULT_ROSTER_KEY)
    }

    pub fn with_roster_key(store: Arc<dyn KeyValueStore>, roster_key: &str) -> Self {
        Self {
            store,
            roster_key: roster_key.to_string(),
        }
    }

    /// Read a record. Stale records are removed and reported as absent;
    /// unreadable ones are removed and reported as `CacheCorrupt`.
    pub fn load<T: DeserializeOwned>(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheRecord<T>>> {
        let Some(contents) = self.store.get(key)? else {
            return Ok(None);
        };

        let record: CacheRecord<T> = match serde_json::from_str(&contents) {
            Ok(record) => record,
            Err(e) => {
                self.discard(key);
                return Err(SourceError::CacheCorrupt(e.to_string()).into());
            }
        };

        if record.is_stale(now) {
            debug!(cache = key, age = %record.age_display(now), "Discarding stale cache");
            self.discard(key);
            return Ok(None);
        }

        Ok(Some(record))
    }

    pub fn save<T: Serialize>(&self, key: &str, data: &T, now: DateTime<Utc>) -> Result<()> {
        let record = CacheRecord::new(data, now);
        let contents = serde_json::to_string(&record)?;
        self.store.set(key, &contents)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.store.remove(key)
    }

    fn discard(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!(cache = key, error = %e, "Failed to remove cache entry");
        }
    }

    // ===== Roster =====

    pub fn load_roster(&self, now: DateTime<Utc>) -> Result<Option<CacheRecord<Vec<RosterEntry>>>> {
        self.load(&self.roster_key, now)
    }

    pub fn save_roster(&self, entries: &[RosterEntry], now: DateTime<Utc>) -> Result<()> {
        self.save(&self.roster_key, &entries, now)
    }

    pub fn clear_roster(&self) -> Result<()> {
        self.remove(&self.roster_key)
    }
}

// ============================================================================
// Tests
// ============================================================================
