//! Beacon Core - Shared Types
//!
//! Pure data structures with no I/O. All other crates depend on this.
//! This crate contains the tenant scope model, typed filter sets, aggregate
//! result shapes, error types and configuration.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod config;
pub mod error;
pub mod filter;
pub mod results;
pub mod scope;

pub use config::AnalyticsConfig;
pub use error::{
    BeaconError, BeaconResult, CacheError, ConfigError, FilterError, PlanError, StoreError,
};
pub use filter::{months_back, previous_month, DateRange, FilterSet, Period};
pub use results::{
    AggregateKind, CsatSummary, CustomerLifetimeValueSummary, DashboardSummary,
    EmployeeHappinessSummary, InvestmentRevenueSummary, JourneyStage, JourneyStageDistribution,
    NpsSummary, NpsTrend, NpsTrendPoint, RetentionCohort, CSAT_BENCHMARK,
    CSAT_SATISFIED_THRESHOLD, NPS_BENCHMARK, RETENTION_BENCHMARK,
};
pub use scope::{IsolationPolicy, Principal, Scope};

/// Tenant identifier.
pub type TenantId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
