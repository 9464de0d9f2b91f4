//! The aggregation query set.
//!
//! Each entry compiles a scoped plan for its table, verifies the
//! placeholder invariant against the final statement text, runs a small
//! constant number of aggregate reads and maps the rows into its result
//! shape. Entries never decide about caching or fallback; that belongs to
//! the layers above.

use beacon_core::{
    months_back, previous_month, BeaconResult, CsatSummary, CustomerLifetimeValueSummary,
    DateRange, EmployeeHappinessSummary, FilterSet, InvestmentRevenueSummary, JourneyStage,
    JourneyStageDistribution, NpsSummary, NpsTrend, NpsTrendPoint, RetentionCohort, Scope,
    StoreError, CSAT_SATISFIED_THRESHOLD,
};
use chrono::{Days, NaiveDate};

use crate::plan::{compile, tenant_predicate, verify_placeholders, PredicateBuilder, TableBindings};
use crate::store::{RelationalStore, SqlRow, SqlValue};

/// Verify the placeholder invariant, then execute.
///
/// Verification failures are compiler bugs and must never reach the store.
async fn checked_query(
    store: &dyn RelationalStore,
    sql: &str,
    params: &[SqlValue],
) -> BeaconResult<Vec<SqlRow>> {
    verify_placeholders(sql, params.len())?;
    store.query(sql, params).await
}

/// An aggregate without GROUP BY always yields exactly one row.
fn single_row(rows: Vec<SqlRow>) -> Result<SqlRow, StoreError> {
    rows.into_iter().next().ok_or_else(|| StoreError::Unavailable {
        reason: "aggregate query returned no rows".to_string(),
    })
}

/// Narrow survey-style aggregates to the effective reporting window: the
/// explicit range when the caller gave one, else the current period window.
fn windowed(filters: &FilterSet, today: NaiveDate) -> FilterSet {
    let mut f = filters.clone();
    f.date_range = Some(filters.effective_range(today));
    f
}

/// Campaign spend, lead revenue, lead count and derived ROAS.
pub async fn investment_revenue_summary(
    store: &dyn RelationalStore,
    scope: &Scope,
    filters: &FilterSet,
) -> BeaconResult<InvestmentRevenueSummary> {
    let campaign_bindings = TableBindings::new("tenant_id")
        .with_client("client_id")
        .with_date("created_at");
    let lead_bindings = TableBindings::new("tenant_id")
        .with_client("client_id")
        .with_date("created_at");

    let spend_plan = compile(scope, filters, &campaign_bindings)?;
    let spend_sql = format!(
        "SELECT COALESCE(SUM(spent), 0)::float8 AS total_spent FROM campaigns {}",
        spend_plan.where_clause()
    );
    let spend_row = single_row(checked_query(store, &spend_sql, spend_plan.params()).await?)?;

    // Revenue counts only leads that converted.
    let revenue_plan = compile(scope, filters, &lead_bindings)?;
    let revenue_sql = format!(
        "SELECT COALESCE(SUM(value), 0)::float8 AS total_revenue FROM leads {} AND status IN ('won', 'closed')",
        revenue_plan.where_clause()
    );
    let revenue_row = single_row(checked_query(store, &revenue_sql, revenue_plan.params()).await?)?;

    let leads_plan = compile(scope, filters, &lead_bindings)?;
    let leads_sql = format!(
        "SELECT COUNT(*)::int8 AS total_leads FROM leads {}",
        leads_plan.where_clause()
    );
    let leads_row = single_row(checked_query(store, &leads_sql, leads_plan.params()).await?)?;

    Ok(InvestmentRevenueSummary::from_totals(
        spend_row.f64_or_zero("total_spent")?,
        revenue_row.f64_or_zero("total_revenue")?,
        leads_row.i64_or_zero("total_leads")?,
    ))
}

/// Clients present in the previous calendar month who are still present in
/// the current one.
pub async fn retention_cohort(
    store: &dyn RelationalStore,
    scope: &Scope,
    filters: &FilterSet,
    today: NaiveDate,
) -> BeaconResult<RetentionCohort> {
    use chrono::Datelike;

    let (prev_year, prev_month) = previous_month(today);
    let (cur_year, cur_month) = (today.year(), today.month());

    let mut builder = PredicateBuilder::new();
    let tenant_pred = tenant_predicate(&mut builder, scope, filters, "tenant_id");
    let py = builder.bind(SqlValue::int(prev_year));
    let pm = builder.bind(SqlValue::int(prev_month as i32));
    let cy = builder.bind(SqlValue::int(cur_year));
    let cm = builder.bind(SqlValue::int(cur_month as i32));

    let sql = format!(
        "WITH prev_month_clients AS ( \
            SELECT DISTINCT client_id FROM client_health_metrics \
            WHERE {tenant_pred} AND period_year = {py} AND period_month = {pm} \
        ), current_month_clients AS ( \
            SELECT DISTINCT client_id FROM client_health_metrics \
            WHERE {tenant_pred} AND period_year = {cy} AND period_month = {cm} \
        ) \
        SELECT \
            (SELECT COUNT(*) FROM prev_month_clients)::int8 AS prev_count, \
            (SELECT COUNT(*) FROM prev_month_clients p \
              JOIN current_month_clients c ON p.client_id = c.client_id)::int8 AS retained_count, \
            (SELECT COUNT(*) FROM current_month_clients)::int8 AS current_total"
    );

    let params = builder.into_params();
    let row = single_row(checked_query(store, &sql, &params).await?)?;

    Ok(RetentionCohort::from_counts(
        row.i64_or_zero("prev_count")?,
        row.i64_or_zero("retained_count")?,
        row.i64_or_zero("current_total")?,
    ))
}

/// Average lifetime value over customers that have one.
pub async fn customer_lifetime_value_summary(
    store: &dyn RelationalStore,
    scope: &Scope,
    filters: &FilterSet,
) -> BeaconResult<CustomerLifetimeValueSummary> {
    let bindings = TableBindings::new("tenant_id").with_client("client_id");
    let plan = compile(scope, filters, &bindings)?;
    let sql = format!(
        "SELECT AVG(lifetime_value)::float8 AS avg_clv, COUNT(*)::int8 AS total_customers \
         FROM unified_customers {} AND lifetime_value > 0",
        plan.where_clause()
    );
    let row = single_row(checked_query(store, &sql, plan.params()).await?)?;

    Ok(CustomerLifetimeValueSummary {
        avg_lifetime_value: row.f64_or_zero("avg_clv")?,
        total_customers: row.i64_or_zero("total_customers")?,
    })
}

/// Customer counts per journey stage, with per-stage touchpoint and LTV
/// averages.
pub async fn journey_stage_distribution(
    store: &dyn RelationalStore,
    scope: &Scope,
    filters: &FilterSet,
) -> BeaconResult<JourneyStageDistribution> {
    let bindings = TableBindings::new("tenant_id")
        .with_client("client_id")
        .with_stage("current_stage");
    let plan = compile(scope, filters, &bindings)?;
    let sql = format!(
        "SELECT current_stage, COUNT(*)::int8 AS count, \
                COALESCE(AVG(total_touchpoints), 0)::float8 AS avg_touchpoints, \
                COALESCE(AVG(lifetime_value), 0)::float8 AS avg_ltv \
         FROM unified_customers {} \
         GROUP BY current_stage ORDER BY count DESC",
        plan.where_clause()
    );
    let rows = checked_query(store, &sql, plan.params()).await?;

    let mut stages = Vec::with_capacity(rows.len());
    for row in rows {
        stages.push(JourneyStage {
            stage: row.text_or("current_stage", "unknown")?.to_string(),
            count: row.i64_or_zero("count")?,
            avg_touchpoints: row.f64_or_zero("avg_touchpoints")?,
            avg_lifetime_value: row.f64_or_zero("avg_ltv")?,
        });
    }
    Ok(JourneyStageDistribution { stages })
}

/// NPS over the effective reporting window.
pub async fn nps_summary(
    store: &dyn RelationalStore,
    scope: &Scope,
    filters: &FilterSet,
    today: NaiveDate,
) -> BeaconResult<NpsSummary> {
    let filters = windowed(filters, today);
    let bindings = TableBindings::new("tenant_id")
        .with_client("client_id")
        .with_date("responded_at");
    let plan = compile(scope, &filters, &bindings)?;
    let sql = format!(
        "SELECT AVG(score)::float8 AS avg_score, \
                COUNT(*)::int8 AS total_responses, \
                (COUNT(*) FILTER (WHERE score >= 9))::int8 AS promoters, \
                (COUNT(*) FILTER (WHERE score >= 7 AND score < 9))::int8 AS passives, \
                (COUNT(*) FILTER (WHERE score < 7))::int8 AS detractors \
         FROM nps_surveys {}",
        plan.where_clause()
    );
    let row = single_row(checked_query(store, &sql, plan.params()).await?)?;

    Ok(NpsSummary::from_counts(
        row.opt_f64("avg_score")?,
        row.i64_or_zero("total_responses")?,
        row.i64_or_zero("promoters")?,
        row.i64_or_zero("passives")?,
        row.i64_or_zero("detractors")?,
    ))
}

/// Month-over-month NPS buckets, newest first.
///
/// Without an explicit range, the window trails `months` calendar months
/// back from `today` (inclusive of the current month).
pub async fn nps_trend(
    store: &dyn RelationalStore,
    scope: &Scope,
    filters: &FilterSet,
    today: NaiveDate,
    months: u32,
) -> BeaconResult<NpsTrend> {
    let mut filters = filters.clone();
    if filters.date_range.is_none() {
        let start = months_back(today, months.saturating_sub(1));
        filters.date_range = Some(DateRange::new(start, today)?);
    }

    let bindings = TableBindings::new("tenant_id")
        .with_client("client_id")
        .with_date("responded_at");
    let plan = compile(scope, &filters, &bindings)?;
    let sql = format!(
        "SELECT (DATE_TRUNC('month', responded_at))::date AS month, \
                AVG(score)::float8 AS avg_score, \
                COUNT(*)::int8 AS responses, \
                (COUNT(*) FILTER (WHERE score >= 9))::int8 AS promoters, \
                (COUNT(*) FILTER (WHERE score < 7))::int8 AS detractors \
         FROM nps_surveys {} \
         GROUP BY 1 ORDER BY 1 DESC",
        plan.where_clause()
    );
    let rows = checked_query(store, &sql, plan.params()).await?;

    let mut points = Vec::with_capacity(rows.len());
    for row in rows {
        points.push(NpsTrendPoint::from_counts(
            row.date("month")?,
            row.opt_f64("avg_score")?,
            row.i64_or_zero("responses")?,
            row.i64_or_zero("promoters")?,
            row.i64_or_zero("detractors")?,
        ));
    }
    Ok(NpsTrend { points })
}

/// CSAT over the effective reporting window.
pub async fn csat_summary(
    store: &dyn RelationalStore,
    scope: &Scope,
    filters: &FilterSet,
    today: NaiveDate,
) -> BeaconResult<CsatSummary> {
    let filters = windowed(filters, today);
    let bindings = TableBindings::new("tenant_id")
        .with_client("client_id")
        .with_date("responded_at");
    let plan = compile(scope, &filters, &bindings)?;
    let sql = format!(
        "SELECT AVG(score)::float8 AS avg_score, \
                COUNT(*)::int8 AS total_responses, \
                (COUNT(*) FILTER (WHERE score >= {CSAT_SATISFIED_THRESHOLD}))::int8 AS satisfied \
         FROM csat_surveys {}",
        plan.where_clause()
    );
    let row = single_row(checked_query(store, &sql, plan.params()).await?)?;

    Ok(CsatSummary::from_counts(
        row.opt_f64("avg_score")?,
        row.i64_or_zero("total_responses")?,
        row.i64_or_zero("satisfied")?,
    ))
}

/// Average team happiness over a trailing week.
///
/// The happiness survey has no client dimension, so a client filter is
/// ignored for this aggregate.
pub async fn employee_happiness_summary(
    store: &dyn RelationalStore,
    scope: &Scope,
    filters: &FilterSet,
    today: NaiveDate,
) -> BeaconResult<EmployeeHappinessSummary> {
    let mut filters = filters.clone();
    if filters.date_range.is_none() {
        filters.date_range = Some(DateRange::new(today - Days::new(7), today)?);
    }

    let bindings = TableBindings::new("tenant_id").with_date("submitted_at");
    let plan = compile(scope, &filters, &bindings)?;
    let sql = format!(
        "SELECT AVG(happiness_score)::float8 AS avg_happiness, \
                COUNT(*)::int8 AS responses \
         FROM employee_happiness {}",
        plan.where_clause()
    );
    let row = single_row(checked_query(store, &sql, plan.params()).await?)?;

    Ok(EmployeeHappinessSummary::from_counts(
        row.opt_f64("avg_happiness")?,
        row.i64_or_zero("responses")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// Mock store returning canned rows by table name and recording every
    /// statement for scoping assertions.
    struct MockStore {
        executed: Mutex<Vec<(String, Vec<SqlValue>)>>,
        respond: fn(&str) -> Vec<SqlRow>,
    }

    impl MockStore {
        fn new(respond: fn(&str) -> Vec<SqlRow>) -> Self {
            Self {
                executed: Mutex::new(Vec::new()),
                respond,
            }
        }

        fn statements(&self) -> Vec<(String, Vec<SqlValue>)> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RelationalStore for MockStore {
        async fn query(&self, sql: &str, params: &[SqlValue]) -> BeaconResult<Vec<SqlRow>> {
            self.executed
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            Ok((self.respond)(sql))
        }
    }

    fn kpi_rows(sql: &str) -> Vec<SqlRow> {
        if sql.contains("FROM campaigns") {
            vec![SqlRow::new().with("total_spent", SqlValue::Double(Some(1000.0)))]
        } else if sql.contains("SUM(value)") {
            vec![SqlRow::new().with("total_revenue", SqlValue::Double(Some(4200.0)))]
        } else if sql.contains("COUNT(*)::int8 AS total_leads") {
            vec![SqlRow::new().with("total_leads", SqlValue::bigint(37))]
        } else {
            vec![]
        }
    }

    #[tokio::test]
    async fn test_investment_revenue_summary_maps_rows() {
        let store = MockStore::new(kpi_rows);
        let scope = Scope::tenant(Uuid::now_v7());
        let summary = investment_revenue_summary(&store, &scope, &FilterSet::new())
            .await
            .unwrap();

        assert_eq!(summary.total_spent, 1000.0);
        assert_eq!(summary.total_revenue, 4200.0);
        assert_eq!(summary.total_leads, 37);
        assert!((summary.roas - 4.2).abs() < 1e-9);

        // Three reads, each carrying the strict tenant predicate.
        let stmts = store.statements();
        assert_eq!(stmts.len(), 3);
        for (sql, params) in stmts {
            assert!(sql.contains("tenant_id = $1"), "unscoped query: {sql}");
            assert_eq!(params.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_retention_cohort_binds_month_windows() {
        fn rows(_sql: &str) -> Vec<SqlRow> {
            vec![SqlRow::new()
                .with("prev_count", SqlValue::bigint(4))
                .with("retained_count", SqlValue::bigint(3))
                .with("current_total", SqlValue::bigint(5))]
        }
        let store = MockStore::new(rows);
        let scope = Scope::tenant(Uuid::now_v7());
        let cohort = retention_cohort(&store, &scope, &FilterSet::new(), d(2024, 1, 15))
            .await
            .unwrap();

        assert_eq!(cohort.retention_rate, 75);
        assert_eq!(cohort.current_month_clients, 5);

        let stmts = store.statements();
        assert_eq!(stmts.len(), 1);
        let (sql, params) = &stmts[0];
        // January wraps to the previous December.
        assert_eq!(params.len(), 5);
        assert_eq!(params[1], SqlValue::int(2023));
        assert_eq!(params[2], SqlValue::int(12));
        assert_eq!(params[3], SqlValue::int(2024));
        assert_eq!(params[4], SqlValue::int(1));
        // The tenant predicate appears in both CTE subqueries but binds once.
        assert_eq!(sql.matches("tenant_id = $1").count(), 2);
    }

    #[tokio::test]
    async fn test_retention_cohort_empty_prev_month_convention() {
        fn rows(_sql: &str) -> Vec<SqlRow> {
            vec![SqlRow::new()
                .with("prev_count", SqlValue::bigint(0))
                .with("retained_count", SqlValue::bigint(0))
                .with("current_total", SqlValue::bigint(2))]
        }
        let store = MockStore::new(rows);
        let cohort = retention_cohort(
            &store,
            &Scope::tenant(Uuid::now_v7()),
            &FilterSet::new(),
            d(2024, 6, 1),
        )
        .await
        .unwrap();
        assert_eq!(cohort.retention_rate, 100);
    }

    #[tokio::test]
    async fn test_nps_summary_defaults_to_period_window() {
        fn rows(_sql: &str) -> Vec<SqlRow> {
            vec![SqlRow::new()
                .with("avg_score", SqlValue::Double(Some(8.4)))
                .with("total_responses", SqlValue::bigint(10))
                .with("promoters", SqlValue::bigint(6))
                .with("passives", SqlValue::bigint(2))
                .with("detractors", SqlValue::bigint(2))]
        }
        let store = MockStore::new(rows);
        let summary = nps_summary(
            &store,
            &Scope::tenant(Uuid::now_v7()),
            &FilterSet::new(),
            d(2024, 3, 10),
        )
        .await
        .unwrap();
        assert_eq!(summary.nps_score, Some(40));

        let stmts = store.statements();
        let (sql, params) = &stmts[0];
        assert!(sql.contains("responded_at >= $2"));
        assert!(sql.contains("responded_at <= $3"));
        // Defaulted to the current calendar month.
        assert_eq!(params[1], SqlValue::date(d(2024, 3, 1)));
        assert_eq!(params[2], SqlValue::date(d(2024, 3, 31)));
    }

    #[tokio::test]
    async fn test_nps_trend_buckets_trailing_months() {
        fn rows(_sql: &str) -> Vec<SqlRow> {
            vec![
                SqlRow::new()
                    .with("month", SqlValue::date(d(2024, 6, 1)))
                    .with("avg_score", SqlValue::Double(Some(8.5)))
                    .with("responses", SqlValue::bigint(20))
                    .with("promoters", SqlValue::bigint(12))
                    .with("detractors", SqlValue::bigint(4)),
                SqlRow::new()
                    .with("month", SqlValue::date(d(2024, 5, 1)))
                    .with("avg_score", SqlValue::Double(Some(7.0)))
                    .with("responses", SqlValue::bigint(10))
                    .with("promoters", SqlValue::bigint(3))
                    .with("detractors", SqlValue::bigint(3)),
            ]
        }
        let store = MockStore::new(rows);
        let trend = nps_trend(
            &store,
            &Scope::tenant(Uuid::now_v7()),
            &FilterSet::new(),
            d(2024, 6, 15),
            6,
        )
        .await
        .unwrap();

        assert_eq!(trend.points.len(), 2);
        assert_eq!(trend.points[0].month, d(2024, 6, 1));
        assert_eq!(trend.points[0].nps_score, Some(40));
        assert_eq!(trend.points[1].nps_score, Some(0));
        assert!(!trend.is_empty());

        // Six trailing months starting at the first of January.
        let stmts = store.statements();
        let (sql, params) = &stmts[0];
        assert!(sql.contains("responded_at >= $2"));
        assert!(sql.contains("responded_at <= $3"));
        assert_eq!(params[1], SqlValue::date(d(2024, 1, 1)));
        assert_eq!(params[2], SqlValue::date(d(2024, 6, 15)));
    }

    #[tokio::test]
    async fn test_employee_happiness_uses_week_window_and_skips_client() {
        fn rows(_sql: &str) -> Vec<SqlRow> {
            vec![SqlRow::new()
                .with("avg_happiness", SqlValue::Double(Some(7.8)))
                .with("responses", SqlValue::bigint(9))]
        }
        let store = MockStore::new(rows);
        let summary = employee_happiness_summary(
            &store,
            &Scope::tenant(Uuid::now_v7()),
            &FilterSet::new().with_client(42),
            d(2024, 3, 10),
        )
        .await
        .unwrap();
        assert_eq!(summary.avg_score, Some(7.8));
        assert_eq!(summary.responses, 9);

        let stmts = store.statements();
        let (sql, params) = &stmts[0];
        assert!(sql.contains("FROM employee_happiness"));
        // No client column on the table: tenant plus the two window bounds.
        assert_eq!(params.len(), 3);
        assert!(sql.contains("submitted_at >= $2"));
        assert_eq!(params[1], SqlValue::date(d(2024, 3, 3)));
        assert_eq!(params[2], SqlValue::date(d(2024, 3, 10)));
    }

    #[tokio::test]
    async fn test_csat_summary_with_zero_responses() {
        fn rows(_sql: &str) -> Vec<SqlRow> {
            vec![SqlRow::new()
                .with("avg_score", SqlValue::Double(None))
                .with("total_responses", SqlValue::bigint(0))
                .with("satisfied", SqlValue::bigint(0))]
        }
        let store = MockStore::new(rows);
        let summary = csat_summary(
            &store,
            &Scope::tenant(Uuid::now_v7()),
            &FilterSet::new(),
            d(2024, 3, 10),
        )
        .await
        .unwrap();
        assert_eq!(summary.percent_satisfied, None);
        assert!(summary.is_empty());
    }

    #[tokio::test]
    async fn test_journey_distribution_maps_stages() {
        fn rows(_sql: &str) -> Vec<SqlRow> {
            vec![
                SqlRow::new()
                    .with("current_stage", SqlValue::text("consideration"))
                    .with("count", SqlValue::bigint(12))
                    .with("avg_touchpoints", SqlValue::Double(Some(3.5)))
                    .with("avg_ltv", SqlValue::Double(Some(900.0))),
                SqlRow::new()
                    .with("current_stage", SqlValue::Text(None))
                    .with("count", SqlValue::bigint(2))
                    .with("avg_touchpoints", SqlValue::Double(Some(1.0)))
                    .with("avg_ltv", SqlValue::Double(Some(0.0))),
            ]
        }
        let store = MockStore::new(rows);
        let dist = journey_stage_distribution(&store, &Scope::tenant(Uuid::now_v7()), &FilterSet::new())
            .await
            .unwrap();
        assert_eq!(dist.stages.len(), 2);
        assert_eq!(dist.stages[0].stage, "consideration");
        assert_eq!(dist.stages[1].stage, "unknown");
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        struct FailingStore;
        #[async_trait]
        impl RelationalStore for FailingStore {
            async fn query(&self, _sql: &str, _params: &[SqlValue]) -> BeaconResult<Vec<SqlRow>> {
                Err(StoreError::Unavailable {
                    reason: "connection refused".to_string(),
                }
                .into())
            }
        }
        let err = customer_lifetime_value_summary(
            &FailingStore,
            &Scope::tenant(Uuid::now_v7()),
            &FilterSet::new(),
        )
        .await
        .unwrap_err();
        assert!(err.is_store_outage());
    }
}
