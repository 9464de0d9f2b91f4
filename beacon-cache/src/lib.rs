//! Beacon Cache - Tenant-Scoped Caching
//!
//! Cache keys derived from scope and filters, pluggable byte-oriented
//! backends, and the read-through coordinator that owns freshness,
//! request coalescing and stale-if-error behavior.

pub mod backend;
pub mod coordinator;
pub mod key;

pub use backend::{CacheBackend, CacheEntry, MemoryCacheBackend};
pub use coordinator::CacheCoordinator;
pub use key::CacheKey;
