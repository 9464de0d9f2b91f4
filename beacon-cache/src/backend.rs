//! Cache backend trait and the in-memory implementation.
//!
//! Backends store opaque serialized bytes with the time they were written;
//! freshness decisions belong to the coordinator, not the backend.

use async_trait::async_trait;
use beacon_core::{BeaconResult, Timestamp};
use chrono::Utc;
use dashmap::DashMap;

use crate::key::CacheKey;

/// One stored cache entry: serialized value, write time and its TTL.
///
/// The TTL travels with the entry so an expired entry remains reachable:
/// staleness is a judgment at read time, not an eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub value: Vec<u8>,
    pub stored_at: Timestamp,
    pub ttl_seconds: u64,
}

impl CacheEntry {
    pub fn new(value: Vec<u8>, ttl: std::time::Duration) -> Self {
        Self {
            value,
            stored_at: Utc::now(),
            ttl_seconds: ttl.as_secs(),
        }
    }

    /// Whether the entry is still within its TTL as of `now`.
    ///
    /// Fresh means `now - stored_at < ttl_seconds`; an entry whose age equals
    /// the TTL exactly is already stale.
    pub fn is_fresh(&self, now: Timestamp) -> bool {
        let age = now.signed_duration_since(self.stored_at);
        age.num_milliseconds() >= 0
            && (age.num_milliseconds() as u128) < self.ttl_seconds as u128 * 1000
    }
}

/// Pluggable cache backend.
///
/// Implementations must be safe for concurrent access. A backend failure is
/// never fatal: the coordinator degrades to computing directly.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch an entry, fresh or not. `None` means no entry exists.
    async fn get(&self, key: &CacheKey) -> BeaconResult<Option<CacheEntry>>;

    /// Store an entry, overwriting any previous value for the key.
    async fn set(&self, key: &CacheKey, entry: CacheEntry) -> BeaconResult<()>;

    /// Remove an entry. Missing keys are not an error.
    async fn remove(&self, key: &CacheKey) -> BeaconResult<()>;
}

/// In-memory backend over a concurrent map. The default for single-process
/// deployments and the fixture for coordinator tests.
#[derive(Debug, Default)]
pub struct MemoryCacheBackend {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, for observability.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &CacheKey) -> BeaconResult<Option<CacheEntry>> {
        Ok(self.entries.get(key.as_str()).map(|e| e.clone()))
    }

    async fn set(&self, key: &CacheKey, entry: CacheEntry) -> BeaconResult<()> {
        self.entries.insert(key.as_str().to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> BeaconResult<()> {
        self.entries.remove(key.as_str());
        Ok(())
    }
}
