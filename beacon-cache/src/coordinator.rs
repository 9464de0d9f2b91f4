//! Read-through cache coordinator.
//!
//! Sits between the analytics operations and the backing store:
//!
//! - fresh entry: served without touching the store;
//! - miss or stale entry: the value is recomputed, with concurrent
//!   requests for the same key coalesced into a single computation;
//! - store outage with a stale entry on hand: the stale entry is served
//!   instead of surfacing the error;
//! - cache backend failure: the cache is bypassed and the value computed
//!   directly. A broken cache degrades performance, never correctness.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use beacon_core::{BeaconError, BeaconResult, CacheError};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::backend::{CacheBackend, CacheEntry};
use crate::key::CacheKey;

type InflightCell = Arc<OnceCell<Result<Vec<u8>, BeaconError>>>;

/// Coordinates cached reads for aggregate computations.
pub struct CacheCoordinator {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
    inflight: Mutex<HashMap<String, InflightCell>>,
}

impl CacheCoordinator {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Read through the cache, computing on miss or staleness.
    ///
    /// Concurrent callers for the same key while a computation is in flight
    /// all receive the result of that single computation.
    pub async fn get_or_compute<T, F, Fut>(&self, key: &CacheKey, compute: F) -> BeaconResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = BeaconResult<T>>,
    {
        let existing = match self.backend.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                // Unreadable cache: compute directly, skip the write-back.
                tracing::warn!(key = %key, error = %e, "cache read failed, bypassing cache");
                return compute().await;
            }
        };

        if let Some(entry) = &existing {
            if entry.is_fresh(Utc::now()) {
                match decode::<T>(&entry.value) {
                    Ok(value) => {
                        tracing::debug!(key = %key, "cache hit");
                        return Ok(value);
                    }
                    Err(e) => {
                        // A corrupt entry is a miss; recompute and overwrite.
                        tracing::warn!(key = %key, error = %e, "corrupt cache entry, recomputing");
                    }
                }
            }
        }

        let bytes = self
            .compute_coalesced(key, || async move {
                let value = compute().await?;
                encode(&value)
            })
            .await;

        match bytes {
            Ok(bytes) => {
                if let Err(e) = self
                    .backend
                    .set(key, CacheEntry::new(bytes.clone(), self.ttl))
                    .await
                {
                    tracing::debug!(key = %key, error = %e, "cache write-back failed");
                }
                Ok(decode(&bytes)?)
            }
            Err(e) if e.is_store_outage() => {
                // Stale-if-error: an outage with a stale entry on hand is
                // absorbed; the caller gets data, the log gets the outage.
                if let Some(entry) = existing {
                    if let Ok(value) = decode::<T>(&entry.value) {
                        tracing::warn!(
                            key = %key,
                            error = %e,
                            stored_at = %entry.stored_at,
                            "store unavailable, serving stale cache entry"
                        );
                        return Ok(value);
                    }
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Run `compute` with at most one execution per key in flight.
    async fn compute_coalesced<F, Fut>(
        &self,
        key: &CacheKey,
        compute: F,
    ) -> Result<Vec<u8>, BeaconError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, BeaconError>>,
    {
        let cell = {
            let mut inflight = self.inflight.lock().unwrap();
            inflight
                .entry(key.as_str().to_string())
                .or_default()
                .clone()
        };

        // Only the first caller's closure runs; the rest await the cell.
        let result = cell.get_or_init(compute).await.clone();

        let mut inflight = self.inflight.lock().unwrap();
        if let Some(current) = inflight.get(key.as_str()) {
            if Arc::ptr_eq(current, &cell) {
                inflight.remove(key.as_str());
            }
        }

        result
    }

    /// Drop any cached entry for the key.
    pub async fn invalidate(&self, key: &CacheKey) -> BeaconResult<()> {
        self.backend.remove(key).await
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, BeaconError> {
    serde_json::to_vec(value).map_err(|e| {
        CacheError::Corrupt {
            reason: format!("serialize failed: {e}"),
        }
        .into()
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CacheError> {
    serde_json::from_slice(bytes).map_err(|e| CacheError::Corrupt {
        reason: format!("deserialize failed: {e}"),
    })
}
