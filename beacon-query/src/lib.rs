//! Beacon Query - Filter Compiler and Aggregates
//!
//! Compiles tenant scopes and filter sets into verified, parameterized
//! query plans, and runs the named aggregate computations against a
//! `RelationalStore`. The Postgres adapter lives here too; everything else
//! in the crate is store-agnostic and testable with in-memory mocks.

pub mod aggregates;
pub mod pg;
pub mod plan;
pub mod store;

pub use aggregates::{
    csat_summary, customer_lifetime_value_summary, employee_happiness_summary,
    investment_revenue_summary, journey_stage_distribution, nps_summary, nps_trend,
    retention_cohort,
};
pub use pg::{DbConfig, PostgresStore};
pub use plan::{compile, verify_placeholders, PredicateBuilder, QueryPlan, TableBindings};
pub use store::{RelationalStore, SqlRow, SqlValue};
