//! The analytics service facade.
//!
//! One operation per named aggregate. Every operation follows the same
//! pipeline: resolve the scope from the principal, build the tenant-scoped
//! cache key, read through the cache (computing against the store on miss
//! or staleness), then substitute demo data only when the computed result
//! is genuinely empty. Collaborators are injected at construction; the
//! service holds no global state.

use std::sync::Arc;

use beacon_core::{
    months_back, AggregateKind, AnalyticsConfig, BeaconResult, CsatSummary,
    CustomerLifetimeValueSummary, DashboardSummary, DateRange, EmployeeHappinessSummary,
    FilterSet, InvestmentRevenueSummary, JourneyStageDistribution, NpsSummary, NpsTrend,
    Principal, RetentionCohort, Scope,
};
use beacon_cache::{CacheBackend, CacheCoordinator, CacheKey};
use beacon_query::{aggregates, RelationalStore};
use chrono::{NaiveDate, Utc};

use crate::fallback::DemoData;

/// Trailing window for the NPS history when the caller does not pick one.
pub const DEFAULT_TREND_MONTHS: u32 = 6;

/// Tenant-scoped, cached analytics operations.
pub struct AnalyticsService {
    store: Arc<dyn RelationalStore>,
    cache: CacheCoordinator,
    config: AnalyticsConfig,
}

impl AnalyticsService {
    pub fn new(
        store: Arc<dyn RelationalStore>,
        cache_backend: Arc<dyn CacheBackend>,
        config: AnalyticsConfig,
    ) -> Self {
        let cache = CacheCoordinator::new(cache_backend, config.cache_ttl);
        Self {
            store,
            cache,
            config,
        }
    }

    /// Resolve the access scope for a request under the configured policy.
    pub fn resolve_scope(&self, principal: Option<&Principal>) -> Scope {
        Scope::resolve(principal, self.config.isolation_policy)
    }

    /// Spend/revenue/ROAS. Date filtering is explicit-range only, so no
    /// `_as_of` variant exists for this one.
    pub async fn investment_revenue(
        &self,
        principal: Option<&Principal>,
        filters: &FilterSet,
    ) -> BeaconResult<InvestmentRevenueSummary> {
        let scope = self.resolve_scope(principal);
        let key = CacheKey::build(AggregateKind::InvestmentRevenue, &scope, filters);
        let summary = self
            .cache
            .get_or_compute(&key, || {
                aggregates::investment_revenue_summary(self.store.as_ref(), &scope, filters)
            })
            .await?;
        if summary.is_empty() {
            tracing::info!(key = %key, "no investment data, serving synthesized summary");
            return Ok(DemoData::for_scope(&scope).investment_revenue());
        }
        Ok(summary)
    }

    pub async fn retention(
        &self,
        principal: Option<&Principal>,
        filters: &FilterSet,
    ) -> BeaconResult<RetentionCohort> {
        self.retention_as_of(principal, filters, Utc::now().date_naive())
            .await
    }

    pub async fn retention_as_of(
        &self,
        principal: Option<&Principal>,
        filters: &FilterSet,
        today: NaiveDate,
    ) -> BeaconResult<RetentionCohort> {
        let scope = self.resolve_scope(principal);
        let key = CacheKey::build(AggregateKind::RetentionCohort, &scope, filters);
        let cohort = self
            .cache
            .get_or_compute(&key, || {
                aggregates::retention_cohort(self.store.as_ref(), &scope, filters, today)
            })
            .await?;
        if cohort.is_empty() {
            tracing::info!(key = %key, "no cohort data, serving synthesized cohort");
            return Ok(DemoData::for_scope(&scope).retention());
        }
        Ok(cohort)
    }

    pub async fn customer_lifetime_value(
        &self,
        principal: Option<&Principal>,
        filters: &FilterSet,
    ) -> BeaconResult<CustomerLifetimeValueSummary> {
        let scope = self.resolve_scope(principal);
        let key = CacheKey::build(AggregateKind::CustomerLifetimeValue, &scope, filters);
        let summary = self
            .cache
            .get_or_compute(&key, || {
                aggregates::customer_lifetime_value_summary(self.store.as_ref(), &scope, filters)
            })
            .await?;
        if summary.is_empty() {
            tracing::info!(key = %key, "no customer data, serving synthesized summary");
            return Ok(DemoData::for_scope(&scope).customer_lifetime_value());
        }
        Ok(summary)
    }

    pub async fn journey_stages(
        &self,
        principal: Option<&Principal>,
        filters: &FilterSet,
    ) -> BeaconResult<JourneyStageDistribution> {
        let scope = self.resolve_scope(principal);
        let key = CacheKey::build(AggregateKind::JourneyStages, &scope, filters);
        let distribution = self
            .cache
            .get_or_compute(&key, || {
                aggregates::journey_stage_distribution(self.store.as_ref(), &scope, filters)
            })
            .await?;
        if distribution.is_empty() {
            tracing::info!(key = %key, "no journey data, serving synthesized distribution");
            return Ok(DemoData::for_scope(&scope).journey());
        }
        Ok(distribution)
    }

    pub async fn nps(
        &self,
        principal: Option<&Principal>,
        filters: &FilterSet,
    ) -> BeaconResult<NpsSummary> {
        self.nps_as_of(principal, filters, Utc::now().date_naive())
            .await
    }

    pub async fn nps_as_of(
        &self,
        principal: Option<&Principal>,
        filters: &FilterSet,
        today: NaiveDate,
    ) -> BeaconResult<NpsSummary> {
        let scope = self.resolve_scope(principal);
        let key = CacheKey::build(AggregateKind::Nps, &scope, filters);
        let summary = self
            .cache
            .get_or_compute(&key, || {
                aggregates::nps_summary(self.store.as_ref(), &scope, filters, today)
            })
            .await?;
        if summary.is_empty() {
            tracing::info!(key = %key, "no survey responses, serving synthesized summary");
            return Ok(DemoData::for_scope(&scope).nps());
        }
        Ok(summary)
    }

    pub async fn nps_trend(
        &self,
        principal: Option<&Principal>,
        filters: &FilterSet,
    ) -> BeaconResult<NpsTrend> {
        self.nps_trend_as_of(
            principal,
            filters,
            DEFAULT_TREND_MONTHS,
            Utc::now().date_naive(),
        )
        .await
    }

    /// Month-over-month NPS history. The trailing window is resolved into
    /// the filter set before keying, so different `months` values get
    /// distinct cache entries.
    pub async fn nps_trend_as_of(
        &self,
        principal: Option<&Principal>,
        filters: &FilterSet,
        months: u32,
        today: NaiveDate,
    ) -> BeaconResult<NpsTrend> {
        let scope = self.resolve_scope(principal);
        let mut filters = filters.clone();
        if filters.date_range.is_none() {
            let start = months_back(today, months.saturating_sub(1));
            filters.date_range = Some(DateRange::new(start, today)?);
        }
        let key = CacheKey::build(AggregateKind::NpsTrend, &scope, &filters);
        let trend = self
            .cache
            .get_or_compute(&key, || {
                aggregates::nps_trend(self.store.as_ref(), &scope, &filters, today, months)
            })
            .await?;
        if trend.is_empty() {
            tracing::info!(key = %key, "no survey history, serving synthesized trend");
            return Ok(DemoData::for_scope(&scope).nps_trend(today, months));
        }
        Ok(trend)
    }

    pub async fn csat(
        &self,
        principal: Option<&Principal>,
        filters: &FilterSet,
    ) -> BeaconResult<CsatSummary> {
        self.csat_as_of(principal, filters, Utc::now().date_naive())
            .await
    }

    pub async fn csat_as_of(
        &self,
        principal: Option<&Principal>,
        filters: &FilterSet,
        today: NaiveDate,
    ) -> BeaconResult<CsatSummary> {
        let scope = self.resolve_scope(principal);
        let key = CacheKey::build(AggregateKind::Csat, &scope, filters);
        let summary = self
            .cache
            .get_or_compute(&key, || {
                aggregates::csat_summary(self.store.as_ref(), &scope, filters, today)
            })
            .await?;
        if summary.is_empty() {
            tracing::info!(key = %key, "no survey responses, serving synthesized summary");
            return Ok(DemoData::for_scope(&scope).csat());
        }
        Ok(summary)
    }

    pub async fn employee_happiness(
        &self,
        principal: Option<&Principal>,
        filters: &FilterSet,
    ) -> BeaconResult<EmployeeHappinessSummary> {
        self.employee_happiness_as_of(principal, filters, Utc::now().date_naive())
            .await
    }

    pub async fn employee_happiness_as_of(
        &self,
        principal: Option<&Principal>,
        filters: &FilterSet,
        today: NaiveDate,
    ) -> BeaconResult<EmployeeHappinessSummary> {
        let scope = self.resolve_scope(principal);
        let key = CacheKey::build(AggregateKind::EmployeeHappiness, &scope, filters);
        let summary = self
            .cache
            .get_or_compute(&key, || {
                aggregates::employee_happiness_summary(self.store.as_ref(), &scope, filters, today)
            })
            .await?;
        if summary.is_empty() {
            tracing::info!(key = %key, "no happiness responses, serving synthesized summary");
            return Ok(DemoData::for_scope(&scope).employee_happiness());
        }
        Ok(summary)
    }

    pub async fn dashboard_summary(
        &self,
        principal: Option<&Principal>,
        filters: &FilterSet,
    ) -> BeaconResult<DashboardSummary> {
        self.dashboard_summary_as_of(principal, filters, Utc::now().date_naive())
            .await
    }

    /// The dashboard composite. Each component goes through its own cache
    /// entry and its own fallback decision, so one empty metric never drags
    /// the rest into demo data.
    pub async fn dashboard_summary_as_of(
        &self,
        principal: Option<&Principal>,
        filters: &FilterSet,
        today: NaiveDate,
    ) -> BeaconResult<DashboardSummary> {
        let (nps, csat, retention, customer_lifetime_value, journey, employee_happiness) =
            tokio::try_join!(
                self.nps_as_of(principal, filters, today),
                self.csat_as_of(principal, filters, today),
                self.retention_as_of(principal, filters, today),
                self.customer_lifetime_value(principal, filters),
                self.journey_stages(principal, filters),
                self.employee_happiness_as_of(principal, filters, today),
            )?;
        Ok(DashboardSummary {
            nps,
            csat,
            retention,
            customer_lifetime_value,
            journey,
            employee_happiness,
        })
    }
}
