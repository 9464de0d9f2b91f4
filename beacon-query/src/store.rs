//! Relational store abstraction.
//!
//! The analytics layer only needs a single primitive from its backing
//! store: `query(sql, params) -> rows`. This module defines that seam so
//! aggregates can run against Postgres in production and against in-memory
//! mocks in tests.

use async_trait::async_trait;
use beacon_core::{BeaconResult, StoreError};
use chrono::NaiveDate;
use uuid::Uuid;

/// A bound SQL parameter value.
///
/// Every variant carries an `Option` so NULLs stay typed: the store adapter
/// needs the concrete type to bind a NULL parameter, and row decoding needs
/// it to distinguish "no rows matched" from "aggregate over zero rows".
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Uuid(Option<Uuid>),
    BigInt(Option<i64>),
    Int(Option<i32>),
    Double(Option<f64>),
    Text(Option<String>),
    Date(Option<NaiveDate>),
}

impl SqlValue {
    pub fn uuid(v: Uuid) -> Self {
        Self::Uuid(Some(v))
    }

    pub fn bigint(v: i64) -> Self {
        Self::BigInt(Some(v))
    }

    pub fn int(v: i32) -> Self {
        Self::Int(Some(v))
    }

    pub fn text(v: impl Into<String>) -> Self {
        Self::Text(Some(v.into()))
    }

    pub fn date(v: NaiveDate) -> Self {
        Self::Date(Some(v))
    }
}

/// One result row, decoded into named, typed columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlRow {
    columns: Vec<(String, SqlValue)>,
}

impl SqlRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. Test fixtures and store adapters both build rows
    /// through this.
    pub fn with(mut self, name: impl Into<String>, value: SqlValue) -> Self {
        self.columns.push((name.into(), value));
        self
    }

    /// Raw column lookup by name.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    fn require(&self, name: &str) -> Result<&SqlValue, StoreError> {
        self.get(name).ok_or_else(|| StoreError::MissingColumn {
            column: name.to_string(),
        })
    }

    /// A numeric column, with SQL NULL (aggregate over zero rows) read as 0.
    pub fn f64_or_zero(&self, name: &str) -> Result<f64, StoreError> {
        match self.require(name)? {
            SqlValue::Double(v) => Ok(v.unwrap_or(0.0)),
            SqlValue::BigInt(v) => Ok(v.unwrap_or(0) as f64),
            SqlValue::Int(v) => Ok(v.unwrap_or(0) as f64),
            other => Err(StoreError::MissingColumn {
                column: format!("{name} (expected numeric, got {other:?})"),
            }),
        }
    }

    /// An integer column, with SQL NULL read as 0.
    pub fn i64_or_zero(&self, name: &str) -> Result<i64, StoreError> {
        match self.require(name)? {
            SqlValue::BigInt(v) => Ok(v.unwrap_or(0)),
            SqlValue::Int(v) => Ok(v.unwrap_or(0) as i64),
            other => Err(StoreError::MissingColumn {
                column: format!("{name} (expected integer, got {other:?})"),
            }),
        }
    }

    /// A nullable float column, preserving NULL.
    pub fn opt_f64(&self, name: &str) -> Result<Option<f64>, StoreError> {
        match self.require(name)? {
            SqlValue::Double(v) => Ok(*v),
            SqlValue::BigInt(v) => Ok(v.map(|i| i as f64)),
            other => Err(StoreError::MissingColumn {
                column: format!("{name} (expected float, got {other:?})"),
            }),
        }
    }

    /// A non-null date column.
    pub fn date(&self, name: &str) -> Result<NaiveDate, StoreError> {
        match self.require(name)? {
            SqlValue::Date(Some(v)) => Ok(*v),
            other => Err(StoreError::MissingColumn {
                column: format!("{name} (expected date, got {other:?})"),
            }),
        }
    }

    /// A text column, substituting `default` for NULL.
    pub fn text_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str, StoreError> {
        match self.require(name)? {
            SqlValue::Text(Some(v)) => Ok(v.as_str()),
            SqlValue::Text(None) => Ok(default),
            other => Err(StoreError::MissingColumn {
                column: format!("{name} (expected text, got {other:?})"),
            }),
        }
    }
}

/// The single primitive the analytics layer requires from its store.
///
/// Implementations must bind `params` positionally against `$1..$n`
/// placeholders in `sql` and are responsible for their own connection
/// pooling and timeouts.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> BeaconResult<Vec<SqlRow>>;
}
