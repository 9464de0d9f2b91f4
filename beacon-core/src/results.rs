//! Aggregate result shapes.
//!
//! Pure data types: each named aggregate computation produces one of these,
//! and they are exactly what gets serialized into the cache. Every shape
//! knows whether it is "empty" — all primary metrics exactly zero — which
//! is the only condition under which the fallback policy may replace it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// NPS score considered a healthy industry average.
pub const NPS_BENCHMARK: i32 = 50;
/// CSAT satisfaction-percentage target.
pub const CSAT_BENCHMARK: i32 = 80;
/// Client retention-rate target.
pub const RETENTION_BENCHMARK: i32 = 75;
/// Minimum CSAT score (1-5 scale) counted as satisfied.
pub const CSAT_SATISFIED_THRESHOLD: i32 = 4;

/// Discriminator for the named aggregates, used as the entity component of
/// cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateKind {
    InvestmentRevenue,
    RetentionCohort,
    CustomerLifetimeValue,
    JourneyStages,
    Nps,
    NpsTrend,
    Csat,
    EmployeeHappiness,
    DashboardSummary,
}

impl AggregateKind {
    /// Stable name used in cache keys. Never reuse a name for a different
    /// shape; cached values are deserialized by it.
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateKind::InvestmentRevenue => "investment_revenue",
            AggregateKind::RetentionCohort => "retention_cohort",
            AggregateKind::CustomerLifetimeValue => "clv",
            AggregateKind::JourneyStages => "journey_stages",
            AggregateKind::Nps => "nps",
            AggregateKind::NpsTrend => "nps_trend",
            AggregateKind::Csat => "csat",
            AggregateKind::EmployeeHappiness => "employee_happiness",
            AggregateKind::DashboardSummary => "dashboard_summary",
        }
    }
}

/// Spend, revenue, lead count and derived ROAS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentRevenueSummary {
    pub total_spent: f64,
    pub total_revenue: f64,
    pub total_leads: i64,
    /// Return on ad spend: revenue / spend, 0 when spend is 0.
    pub roas: f64,
}

impl InvestmentRevenueSummary {
    pub fn from_totals(total_spent: f64, total_revenue: f64, total_leads: i64) -> Self {
        let roas = if total_spent > 0.0 {
            total_revenue / total_spent
        } else {
            0.0
        };
        Self {
            total_spent,
            total_revenue,
            total_leads,
            roas,
        }
    }

    /// No data loaded yet: spend, revenue and leads all exactly zero.
    pub fn is_empty(&self) -> bool {
        self.total_spent == 0.0 && self.total_revenue == 0.0 && self.total_leads == 0
    }
}

/// Consecutive-month client cohort overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionCohort {
    pub prev_month_clients: i64,
    pub retained_clients: i64,
    pub current_month_clients: i64,
    /// retained / prev * 100, rounded. 100 when the previous month had no
    /// clients: a documented convention for new tenants, not a claim that
    /// retention is perfect.
    pub retention_rate: i32,
    pub benchmark: i32,
}

impl RetentionCohort {
    pub fn from_counts(prev: i64, retained: i64, current: i64) -> Self {
        let retention_rate = if prev > 0 {
            ((retained as f64 / prev as f64) * 100.0).round() as i32
        } else {
            100
        };
        Self {
            prev_month_clients: prev,
            retained_clients: retained,
            current_month_clients: current,
            retention_rate,
            benchmark: RETENTION_BENCHMARK,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prev_month_clients == 0 && self.current_month_clients == 0
    }
}

/// Average customer lifetime value over customers with a positive LTV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerLifetimeValueSummary {
    pub avg_lifetime_value: f64,
    pub total_customers: i64,
}

impl CustomerLifetimeValueSummary {
    pub fn is_empty(&self) -> bool {
        self.total_customers == 0
    }
}

/// One journey stage bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyStage {
    pub stage: String,
    pub count: i64,
    pub avg_touchpoints: f64,
    pub avg_lifetime_value: f64,
}

/// Distribution of customers across journey stages.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JourneyStageDistribution {
    pub stages: Vec<JourneyStage>,
}

impl JourneyStageDistribution {
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty() || self.stages.iter().all(|s| s.count == 0)
    }
}

/// Net-Promoter-Score summary over a survey window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpsSummary {
    pub avg_score: Option<f64>,
    pub responses: i64,
    pub promoters: i64,
    pub passives: i64,
    pub detractors: i64,
    /// (promoters - detractors) / responses * 100, rounded.
    /// `None` when there are no responses.
    pub nps_score: Option<i32>,
    pub benchmark: i32,
}

impl NpsSummary {
    pub fn from_counts(
        avg_score: Option<f64>,
        responses: i64,
        promoters: i64,
        passives: i64,
        detractors: i64,
    ) -> Self {
        let nps_score = if responses > 0 {
            Some((((promoters - detractors) as f64 / responses as f64) * 100.0).round() as i32)
        } else {
            None
        };
        Self {
            avg_score,
            responses,
            promoters,
            passives,
            detractors,
            nps_score,
            benchmark: NPS_BENCHMARK,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.responses == 0
    }
}

/// One calendar-month bucket of the NPS history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpsTrendPoint {
    /// First day of the bucket's month.
    pub month: NaiveDate,
    pub avg_score: Option<f64>,
    pub responses: i64,
    pub promoters: i64,
    pub detractors: i64,
    /// Same derivation as `NpsSummary::nps_score`; `None` for a month with
    /// no responses.
    pub nps_score: Option<i32>,
}

impl NpsTrendPoint {
    pub fn from_counts(
        month: NaiveDate,
        avg_score: Option<f64>,
        responses: i64,
        promoters: i64,
        detractors: i64,
    ) -> Self {
        let nps_score = if responses > 0 {
            Some((((promoters - detractors) as f64 / responses as f64) * 100.0).round() as i32)
        } else {
            None
        };
        Self {
            month,
            avg_score,
            responses,
            promoters,
            detractors,
            nps_score,
        }
    }
}

/// Month-over-month NPS history, newest month first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NpsTrend {
    pub points: Vec<NpsTrendPoint>,
}

impl NpsTrend {
    pub fn is_empty(&self) -> bool {
        self.points.iter().all(|p| p.responses == 0)
    }
}

/// Customer-satisfaction summary over a survey window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsatSummary {
    pub avg_score: Option<f64>,
    pub responses: i64,
    pub satisfied: i64,
    /// satisfied / responses * 100, rounded. `None` when no responses.
    pub percent_satisfied: Option<i32>,
    pub benchmark: i32,
}

impl CsatSummary {
    pub fn from_counts(avg_score: Option<f64>, responses: i64, satisfied: i64) -> Self {
        let percent_satisfied = if responses > 0 {
            Some(((satisfied as f64 / responses as f64) * 100.0).round() as i32)
        } else {
            None
        };
        Self {
            avg_score,
            responses,
            satisfied,
            percent_satisfied,
            benchmark: CSAT_BENCHMARK,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.responses == 0
    }
}

/// Average team happiness (1-10 scale) over the reporting window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeHappinessSummary {
    pub avg_score: Option<f64>,
    pub responses: i64,
}

impl EmployeeHappinessSummary {
    pub fn from_counts(avg_score: Option<f64>, responses: i64) -> Self {
        Self {
            avg_score,
            responses,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.responses == 0
    }
}

/// Convenience composite for the dashboard landing view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub nps: NpsSummary,
    pub csat: CsatSummary,
    pub retention: RetentionCohort,
    pub customer_lifetime_value: CustomerLifetimeValueSummary,
    pub journey: JourneyStageDistribution,
    pub employee_happiness: EmployeeHappinessSummary,
}
