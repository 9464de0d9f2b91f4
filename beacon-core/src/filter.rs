//! Typed filter sets for analytics queries.
//!
//! A `FilterSet` is built once per request from raw query parameters and is
//! immutable afterwards. Validation happens at construction time so the
//! compiler and cache layers can assume well-formed input.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{FilterError, TenantId};

/// An inclusive date range with `start <= end` guaranteed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a date range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, FilterError> {
        if start > end {
            return Err(FilterError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

/// Reporting period used when the caller does not supply an explicit range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

impl Period {
    /// Parse a period from its query-parameter form.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "quarter" => Some(Self::Quarter),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    /// The current calendar window containing `today`.
    ///
    /// Weeks start on Monday; quarters are calendar quarters. The returned
    /// range is inclusive on both ends.
    pub fn current_window(&self, today: NaiveDate) -> DateRange {
        let (start, end) = match self {
            Period::Day => (today, today),
            Period::Week => {
                let weekday = today.weekday().num_days_from_monday() as u64;
                let start = today - Days::new(weekday);
                (start, start + Days::new(6))
            }
            Period::Month => {
                let start = first_of_month(today.year(), today.month());
                (start, last_of_month(today.year(), today.month()))
            }
            Period::Quarter => {
                let q_start_month = 1 + ((today.month() - 1) / 3) * 3;
                let start = first_of_month(today.year(), q_start_month);
                (start, last_of_month(today.year(), q_start_month + 2))
            }
            Period::Year => (
                first_of_month(today.year(), 1),
                last_of_month(today.year(), 12),
            ),
        };
        // Both bounds come from the same calendar window, so start <= end.
        DateRange { start, end }
    }
}

/// First day of the given month.
fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or(NaiveDate::MIN)
}

/// Last day of the given month.
fn last_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    first_of_month(next_year, next_month) - Days::new(1)
}

/// The calendar month preceding the one containing `today`, as
/// `(year, month)`. Used by the retention cohort computation.
pub fn previous_month(today: NaiveDate) -> (i32, u32) {
    if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    }
}

/// First day of the calendar month `months` before the one containing
/// `today`. `months_back(today, 0)` is the first of the current month.
pub fn months_back(today: NaiveDate, months: u32) -> NaiveDate {
    let total = today.year() * 12 + today.month0() as i32 - months as i32;
    first_of_month(total.div_euclid(12), total.rem_euclid(12) as u32 + 1)
}

/// The typed filter set for one analytics request.
///
/// Built via the `with_*` methods; field order is fixed, so two filter sets
/// with the same values are identical regardless of construction order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    /// Explicit tenant filter (distinct from the scope's tenant bind; a
    /// super-admin may narrow the view to one tenant).
    pub tenant_id: Option<TenantId>,
    /// Client (end-customer account) filter.
    pub client_id: Option<i64>,
    /// Explicit date range. When absent, aggregates that are
    /// period-sensitive use `period.current_window(today)`.
    pub date_range: Option<DateRange>,
    /// Journey/funnel stage filter.
    pub stage: Option<String>,
    /// Reporting period for defaulted windows.
    pub period: Period,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn with_client(mut self, client_id: i64) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    /// The effective date range: the explicit one, or the current period
    /// window when none was supplied.
    pub fn effective_range(&self, today: NaiveDate) -> DateRange {
        self.date_range
            .unwrap_or_else(|| self.period.current_window(today))
    }

    /// Canonical textual form used for cache keying. Fields appear in a
    /// fixed order with explicit markers for absent values, so semantically
    /// identical filter sets always canonicalize identically.
    pub fn canonical(&self) -> String {
        let tenant = self
            .tenant_id
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        let client = self
            .client_id
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let range = self
            .date_range
            .map(|r| format!("{}..{}", r.start(), r.end()))
            .unwrap_or_else(|| "-".to_string());
        let stage = self.stage.as_deref().unwrap_or("-");
        format!(
            "tenant={tenant};client={client};range={range};stage={stage};period={:?}",
            self.period
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        let err = DateRange::new(d(2024, 2, 1), d(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, FilterError::InvalidDateRange { .. }));
    }

    #[test]
    fn test_date_range_accepts_single_day() {
        let range = DateRange::new(d(2024, 1, 15), d(2024, 1, 15)).unwrap();
        assert_eq!(range.start(), range.end());
    }

    #[test]
    fn test_month_window() {
        let range = Period::Month.current_window(d(2024, 2, 14));
        assert_eq!(range.start(), d(2024, 2, 1));
        assert_eq!(range.end(), d(2024, 2, 29)); // leap year
    }

    #[test]
    fn test_week_window_starts_monday() {
        // 2024-01-10 is a Wednesday.
        let range = Period::Week.current_window(d(2024, 1, 10));
        assert_eq!(range.start(), d(2024, 1, 8));
        assert_eq!(range.end(), d(2024, 1, 14));
    }

    #[test]
    fn test_quarter_window() {
        let range = Period::Quarter.current_window(d(2024, 5, 20));
        assert_eq!(range.start(), d(2024, 4, 1));
        assert_eq!(range.end(), d(2024, 6, 30));
    }

    #[test]
    fn test_year_window() {
        let range = Period::Year.current_window(d(2024, 7, 1));
        assert_eq!(range.start(), d(2024, 1, 1));
        assert_eq!(range.end(), d(2024, 12, 31));
    }

    #[test]
    fn test_previous_month_wraps_january() {
        assert_eq!(previous_month(d(2024, 1, 15)), (2023, 12));
        assert_eq!(previous_month(d(2024, 6, 15)), (2024, 5));
    }

    #[test]
    fn test_months_back() {
        assert_eq!(months_back(d(2024, 3, 10), 0), d(2024, 3, 1));
        assert_eq!(months_back(d(2024, 3, 10), 5), d(2023, 10, 1));
        // Wraps across year boundaries.
        assert_eq!(months_back(d(2024, 1, 15), 2), d(2023, 11, 1));
    }

    #[test]
    fn test_effective_range_prefers_explicit() {
        let explicit = DateRange::new(d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        let filters = FilterSet::new().with_date_range(explicit);
        assert_eq!(filters.effective_range(d(2024, 6, 1)), explicit);

        let defaulted = FilterSet::new().effective_range(d(2024, 6, 15));
        assert_eq!(defaulted.start(), d(2024, 6, 1));
        assert_eq!(defaulted.end(), d(2024, 6, 30));
    }

    #[test]
    fn test_canonical_is_order_insensitive() {
        let tenant = Uuid::now_v7();
        let range = DateRange::new(d(2024, 1, 1), d(2024, 1, 31)).unwrap();

        let a = FilterSet::new()
            .with_tenant(tenant)
            .with_client(42)
            .with_date_range(range);
        let b = FilterSet::new()
            .with_date_range(range)
            .with_client(42)
            .with_tenant(tenant);
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_canonical_differs_per_value() {
        let base = FilterSet::new().with_client(42);
        let other = FilterSet::new().with_client(43);
        assert_ne!(base.canonical(), other.canonical());
        assert_ne!(base.canonical(), FilterSet::new().canonical());
    }

    #[test]
    fn test_period_parse() {
        assert_eq!(Period::parse("month"), Some(Period::Month));
        assert_eq!(Period::parse("QUARTER"), Some(Period::Quarter));
        assert_eq!(Period::parse("fortnight"), None);
    }
}
