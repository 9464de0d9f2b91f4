//! Error types for Beacon operations

use std::time::Duration;
use thiserror::Error;

/// Filter validation errors.
///
/// These represent malformed or contradictory caller input and are surfaced
/// immediately as client errors. They are never retried and never trigger
/// the stale-cache or fallback paths.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Query plan invariant violations.
///
/// A plan error means the filter compiler produced a clause whose
/// placeholder set does not match its bound values. This must never reach
/// the store; the compiler verifies the plan before execution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("Parameter index mismatch: clause renders {placeholders} placeholders but {bound} values are bound")]
    ParameterIndexMismatch { placeholders: usize, bound: usize },

    #[error("Placeholder indices are not contiguous from 1: {indices:?}")]
    NonContiguousPlaceholders { indices: Vec<usize> },
}

/// Backing store errors.
///
/// Transient infrastructure failures. The cache coordinator recovers from
/// these by serving a stale entry when one exists.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Store query timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Unexpected row shape: missing column {column}")]
    MissingColumn { column: String },
}

/// Cache backend errors.
///
/// Recovered locally by bypassing the cache and computing directly; these
/// are never surfaced to the end caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cached value could not be decoded: {reason}")]
    Corrupt { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Beacon operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BeaconError {
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl BeaconError {
    /// Whether this error represents a transient store outage that the
    /// cache coordinator may absorb by serving a stale entry.
    pub fn is_store_outage(&self) -> bool {
        matches!(self, BeaconError::Store(_))
    }

    /// Whether this error is caller input that should surface as a
    /// 400-equivalent response.
    pub fn is_client_error(&self) -> bool {
        matches!(self, BeaconError::Filter(_))
    }
}

/// Result type alias for Beacon operations.
pub type BeaconResult<T> = Result<T, BeaconError>;

// =============================================================================
// TESTS
// =============================================================================
