//! Demo-data synthesis for tenants with no loaded data yet.
//!
//! A brand-new tenant has empty tables, and an all-zero dashboard reads
//! like a broken one. When an aggregate comes back genuinely empty the
//! service substitutes plausible synthesized numbers instead. Synthesis is
//! seeded per tenant, so a tenant sees the same demo dashboard on every
//! request until real data arrives.
//!
//! Synthesized values never enter the cache and never mix with real data:
//! substitution happens only when the computed result's `is_empty()` holds,
//! which means every primary metric was exactly zero.

use beacon_core::{
    months_back, CsatSummary, CustomerLifetimeValueSummary, DashboardSummary,
    EmployeeHappinessSummary, InvestmentRevenueSummary, JourneyStage, JourneyStageDistribution,
    NpsSummary, NpsTrend, NpsTrendPoint, RetentionCohort, Scope,
};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Stable synthesis seed for a scope. Unbound views share one seed.
pub fn seed_for(scope: &Scope) -> u64 {
    scope.tenant_id.map(|id| id.as_u128() as u64).unwrap_or(0)
}

/// Seeded generator for one tenant's demo metrics.
pub struct DemoData {
    rng: StdRng,
}

impl DemoData {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn for_scope(scope: &Scope) -> Self {
        Self::new(seed_for(scope))
    }

    pub fn investment_revenue(&mut self) -> InvestmentRevenueSummary {
        let spent = self.rng.random_range(20_000.0..60_000.0_f64).round();
        let revenue = spent * self.rng.random_range(2.5..5.0_f64);
        let leads = self.rng.random_range(400..1_500);
        InvestmentRevenueSummary::from_totals(spent, revenue.round(), leads)
    }

    pub fn retention(&mut self) -> RetentionCohort {
        let prev = self.rng.random_range(20..60);
        let retained = self.rng.random_range(prev * 7 / 10..=prev);
        let current = retained + self.rng.random_range(0..10);
        RetentionCohort::from_counts(prev, retained, current)
    }

    pub fn customer_lifetime_value(&mut self) -> CustomerLifetimeValueSummary {
        CustomerLifetimeValueSummary {
            avg_lifetime_value: self.rng.random_range(1_500.0..6_000.0_f64).round(),
            total_customers: self.rng.random_range(100..800),
        }
    }

    pub fn journey(&mut self) -> JourneyStageDistribution {
        let stages = ["awareness", "consideration", "decision", "retention"];
        let mut buckets = Vec::with_capacity(stages.len());
        let mut remaining = self.rng.random_range(300..900_i64);
        for (i, stage) in stages.iter().enumerate() {
            let count = if i == stages.len() - 1 {
                remaining.max(1)
            } else {
                let c = self.rng.random_range(1..=remaining.max(2) / 2);
                remaining -= c;
                c
            };
            buckets.push(JourneyStage {
                stage: (*stage).to_string(),
                count,
                avg_touchpoints: self.rng.random_range(1.5..8.0_f64),
                avg_lifetime_value: self.rng.random_range(500.0..4_000.0_f64).round(),
            });
        }
        JourneyStageDistribution { stages: buckets }
    }

    pub fn nps(&mut self) -> NpsSummary {
        let responses = self.rng.random_range(40..200_i64);
        let promoters = self.rng.random_range(responses / 2..responses * 3 / 4);
        let detractors = self.rng.random_range(0..responses / 5);
        let passives = responses - promoters - detractors;
        let avg = 6.0 + (promoters as f64 / responses as f64) * 4.0;
        NpsSummary::from_counts(Some(avg), responses, promoters, passives, detractors)
    }

    /// One synthesized bucket per trailing month, newest first, matching
    /// the shape the real trend query produces.
    pub fn nps_trend(&mut self, today: NaiveDate, months: u32) -> NpsTrend {
        let months = months.max(1);
        let mut points = Vec::with_capacity(months as usize);
        for back in 0..months {
            let responses = self.rng.random_range(20..120_i64);
            let promoters = self.rng.random_range(responses / 2..responses * 3 / 4);
            let detractors = self.rng.random_range(0..responses / 5);
            let avg = 6.0 + (promoters as f64 / responses as f64) * 4.0;
            points.push(NpsTrendPoint::from_counts(
                months_back(today, back),
                Some(avg),
                responses,
                promoters,
                detractors,
            ));
        }
        NpsTrend { points }
    }

    pub fn employee_happiness(&mut self) -> EmployeeHappinessSummary {
        let responses = self.rng.random_range(5..40_i64);
        let avg = self.rng.random_range(6.5..9.0_f64);
        EmployeeHappinessSummary::from_counts(Some(avg), responses)
    }

    pub fn csat(&mut self) -> CsatSummary {
        let responses = self.rng.random_range(40..200_i64);
        let satisfied = self.rng.random_range(responses * 3 / 4..=responses);
        let avg = 3.5 + (satisfied as f64 / responses as f64) * 1.4;
        CsatSummary::from_counts(Some(avg), responses, satisfied)
    }

    pub fn dashboard(&mut self) -> DashboardSummary {
        DashboardSummary {
            nps: self.nps(),
            csat: self.csat(),
            retention: self.retention(),
            customer_lifetime_value: self.customer_lifetime_value(),
            journey: self.journey(),
            employee_happiness: self.employee_happiness(),
        }
    }
}
