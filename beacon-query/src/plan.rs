//! Filter compiler.
//!
//! Turns a `Scope` + `FilterSet` into a bound query plan. The central idea
//! is that placeholder-index allocation is owned by one builder: a
//! predicate cannot enter the clause without its parameter entering the
//! bound list in the same call, which eliminates the drift bug where clause
//! text and parameter lists are maintained by hand in parallel.

use beacon_core::{BeaconResult, FilterSet, PlanError, Scope};

use crate::store::SqlValue;

/// Marker replaced with the allocated `$n` placeholder in predicate
/// templates. A template may repeat the marker; all occurrences receive the
/// same index and the value is bound once.
const SLOT: &str = "${}";

/// Column bindings for one table.
///
/// Aggregates describe which filterable columns their table actually has;
/// filters without a matching column are skipped without reserving a
/// placeholder index.
#[derive(Debug, Clone, Copy)]
pub struct TableBindings<'a> {
    pub tenant_column: &'a str,
    pub client_column: Option<&'a str>,
    pub stage_column: Option<&'a str>,
    pub date_column: Option<&'a str>,
}

impl<'a> TableBindings<'a> {
    pub fn new(tenant_column: &'a str) -> Self {
        Self {
            tenant_column,
            client_column: None,
            stage_column: None,
            date_column: None,
        }
    }

    pub fn with_client(mut self, column: &'a str) -> Self {
        self.client_column = Some(column);
        self
    }

    pub fn with_stage(mut self, column: &'a str) -> Self {
        self.stage_column = Some(column);
        self
    }

    pub fn with_date(mut self, column: &'a str) -> Self {
        self.date_column = Some(column);
        self
    }
}

/// Builder that owns placeholder-index allocation.
#[derive(Debug, Default)]
pub struct PredicateBuilder {
    predicates: Vec<String>,
    params: Vec<SqlValue>,
}

impl PredicateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return its `$n` placeholder. Used when a predicate
    /// is assembled outside the plain AND-chain (e.g. inside a CTE).
    pub fn bind(&mut self, value: SqlValue) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    /// Render a template, binding `value` once and substituting every
    /// `${}` marker with the allocated index.
    pub fn render(&mut self, template: &str, value: SqlValue) -> String {
        let slot = self.bind(value);
        template.replace(SLOT, &slot)
    }

    /// Render a template and append it to the predicate chain.
    pub fn push(&mut self, template: &str, value: SqlValue) -> &mut Self {
        let rendered = self.render(template, value);
        self.predicates.push(rendered);
        self
    }

    /// Number of values bound so far.
    pub fn bound(&self) -> usize {
        self.params.len()
    }

    /// Consume the builder, yielding only the bound values.
    ///
    /// For hand-assembled SQL (CTEs) where the placeholder invariant is
    /// verified against the full statement text rather than the plan's own
    /// clause.
    pub fn into_params(self) -> Vec<SqlValue> {
        self.params
    }

    /// Finish the plan, re-verifying the placeholder invariant.
    pub fn build(self) -> Result<QueryPlan, PlanError> {
        let plan = QueryPlan {
            predicates: self.predicates,
            params: self.params,
        };
        verify_placeholders(&plan.where_clause(), plan.params.len())?;
        Ok(plan)
    }
}

/// A compiled, verified query plan: rendered predicates plus their bound
/// values, placeholder indices contiguous from `$1`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    predicates: Vec<String>,
    params: Vec<SqlValue>,
}

impl QueryPlan {
    /// The rendered `WHERE ...` clause, or an empty string when there are
    /// no predicates.
    pub fn where_clause(&self) -> String {
        if self.predicates.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.predicates.join(" AND "))
        }
    }

    /// Rendered predicates without the `WHERE` keyword, for embedding in
    /// hand-built SQL such as CTE subqueries.
    pub fn predicates(&self) -> &[String] {
        &self.predicates
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// Verify that the distinct `$n` placeholders in `sql` are exactly the
/// contiguous integers `1..=param_count`.
///
/// This is the last line of defense before query execution; a failure here
/// is an internal compiler bug, never a caller error, and must not reach
/// the store.
pub fn verify_placeholders(sql: &str, param_count: usize) -> Result<(), PlanError> {
    let mut indices: Vec<usize> = Vec::new();
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end > start {
                // sql is valid UTF-8 and this span is all ASCII digits.
                if let Ok(idx) = sql[start..end].parse::<usize>() {
                    indices.push(idx);
                }
                i = end;
                continue;
            }
        }
        i += 1;
    }

    indices.sort_unstable();
    indices.dedup();

    if indices.len() != param_count {
        return Err(PlanError::ParameterIndexMismatch {
            placeholders: indices.len(),
            bound: param_count,
        });
    }
    for (expected, actual) in (1..=param_count).zip(indices.iter()) {
        if *actual != expected {
            return Err(PlanError::NonContiguousPlaceholders { indices });
        }
    }
    Ok(())
}

/// Compile a scope + filter set into a query plan for one table.
///
/// Predicate order is fixed: tenant, client, stage, date-start, date-end.
/// The tenant predicate is always present:
/// - super-admin scope: `(tenant = $1 OR $1 IS NULL)`, bound to the
///   explicit tenant filter when the caller narrowed the view, otherwise
///   NULL (matches every tenant);
/// - tenant-bound scope: strict `tenant = $1`, bound to the scope's own
///   tenant. A scope with no tenant binds NULL, which strict equality
///   never matches — failing closed rather than leaking.
pub fn compile(
    scope: &Scope,
    filters: &FilterSet,
    bindings: &TableBindings<'_>,
) -> BeaconResult<QueryPlan> {
    let mut builder = PredicateBuilder::new();

    let tenant_pred = tenant_predicate(&mut builder, scope, filters, bindings.tenant_column);
    builder.predicates.push(tenant_pred);

    if let (Some(col), Some(client_id)) = (bindings.client_column, filters.client_id) {
        builder.push(
            &format!("{col} = {SLOT}"),
            SqlValue::bigint(client_id),
        );
    }

    if let (Some(col), Some(stage)) = (bindings.stage_column, filters.stage.as_deref()) {
        builder.push(&format!("{col} = {SLOT}"), SqlValue::text(stage));
    }

    if let (Some(col), Some(range)) = (bindings.date_column, filters.date_range) {
        builder.push(&format!("{col} >= {SLOT}"), SqlValue::date(range.start()));
        builder.push(&format!("{col} <= {SLOT}"), SqlValue::date(range.end()));
    }

    Ok(builder.build()?)
}

/// Render the tenant predicate for one table, binding exactly one value.
///
/// Shared between `compile` and aggregates that hand-assemble SQL (the
/// retention CTE reuses the rendered predicate in two subqueries; the
/// single `$n` reference keeps one bound value).
pub fn tenant_predicate(
    builder: &mut PredicateBuilder,
    scope: &Scope,
    filters: &FilterSet,
    column: &str,
) -> String {
    if scope.is_super_admin {
        // Super-admins see everything unless they explicitly narrowed the
        // view; the principal's own tenant never binds implicitly here.
        builder.render(
            &format!("({column} = {SLOT} OR {SLOT} IS NULL)"),
            SqlValue::Uuid(filters.tenant_id),
        )
    } else {
        builder.render(
            &format!("{column} = {SLOT}"),
            SqlValue::Uuid(scope.tenant_id),
        )
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use beacon_core::{DateRange, FilterSet, Scope};
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn filter_strategy() -> impl Strategy<Value = FilterSet> {
        (
            any::<bool>(),
            proptest::option::of(0i64..10_000),
            proptest::option::of("(won|lost|consideration|retention)"),
            proptest::option::of((0i64..5_000, 0i64..5_000)),
        )
            .prop_map(|(with_tenant, client, stage, range_days)| {
                let mut f = FilterSet::new();
                if with_tenant {
                    f = f.with_tenant(Uuid::from_u128(0xBEAC_0000_0001));
                }
                if let Some(c) = client {
                    f = f.with_client(c);
                }
                if let Some(s) = stage {
                    f = f.with_stage(s);
                }
                if let Some((a, b)) = range_days {
                    let epoch = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
                    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                    let start = epoch + chrono::Days::new(lo as u64);
                    let end = epoch + chrono::Days::new(hi as u64);
                    f = f.with_date_range(DateRange::new(start, end).unwrap());
                }
                f
            })
    }

    fn scope_strategy() -> impl Strategy<Value = Scope> {
        prop_oneof![
            Just(Scope::tenant(Uuid::from_u128(0xBEAC_0000_0002))),
            Just(Scope::super_admin(None)),
            Just(Scope::super_admin(Some(Uuid::from_u128(0xBEAC_0000_0003)))),
            Just(Scope {
                is_super_admin: false,
                tenant_id: None
            }),
        ]
    }

    proptest! {
        /// The single most important invariant of the subsystem: for every
        /// combination of present/absent filters, the rendered clause's
        /// distinct placeholders are exactly $1..$n for n bound values.
        #[test]
        fn prop_placeholder_invariant(scope in scope_strategy(), filters in filter_strategy()) {
            let bindings = TableBindings::new("tenant_id")
                .with_client("client_id")
                .with_stage("current_stage")
                .with_date("created_at");
            let plan = compile(&scope, &filters, &bindings).unwrap();
            prop_assert!(verify_placeholders(&plan.where_clause(), plan.param_count()).is_ok());
        }

        /// Tenant isolation: a tenant-bound scope always renders the strict
        /// equality predicate regardless of which optional filters appear.
        #[test]
        fn prop_tenant_isolation(filters in filter_strategy()) {
            let tenant = Uuid::from_u128(0xBEAC_0000_0004);
            let bindings = TableBindings::new("tenant_id")
                .with_client("client_id")
                .with_stage("current_stage")
                .with_date("created_at");
            let plan = compile(&Scope::tenant(tenant), &filters, &bindings).unwrap();
            let clause = plan.where_clause();
            prop_assert!(clause.starts_with("WHERE tenant_id = $1"));
            prop_assert!(!clause.contains("$1 IS NULL"));
            prop_assert_eq!(plan.params()[0].clone(), SqlValue::uuid(tenant));
        }
    }
}
