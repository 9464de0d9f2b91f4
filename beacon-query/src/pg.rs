//! PostgreSQL store adapter.
//!
//! Implements `RelationalStore` on top of a deadpool-postgres pool. Every
//! query runs under the configured timeout; the layers above treat a
//! timeout like any other transient store outage.

use std::time::Duration;

use async_trait::async_trait;
use beacon_core::{AnalyticsConfig, BeaconResult, StoreError};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::NoTls;

use crate::store::{RelationalStore, SqlRow, SqlValue};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
///
/// Covers the connection and pool knobs only; the per-query timeout lives in
/// `AnalyticsConfig` with the rest of the runtime tuning.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "beacon".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("BEACON_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("BEACON_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("BEACON_DB_NAME").unwrap_or_else(|_| "beacon".to_string()),
            user: std::env::var("BEACON_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("BEACON_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("BEACON_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> BeaconResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(self.max_size));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Unavailable {
                reason: format!("failed to create pool: {e}"),
            })?;

        Ok(pool)
    }
}

// ============================================================================
// STORE ADAPTER
// ============================================================================

/// `RelationalStore` backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool,
    query_timeout: Duration,
}

impl PostgresStore {
    pub fn new(pool: Pool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    /// Build a store and its pool from configuration. The query deadline
    /// comes from `AnalyticsConfig`, which owns all runtime tuning.
    pub fn from_config(db: &DbConfig, config: &AnalyticsConfig) -> BeaconResult<Self> {
        let pool = db.create_pool()?;
        Ok(Self::new(pool, config.query_timeout))
    }

    /// Current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// The deadline applied to every query.
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    async fn get_conn(&self) -> Result<deadpool_postgres::Object, StoreError> {
        self.pool.get().await.map_err(|e| StoreError::Unavailable {
            reason: format!("pool checkout failed: {e}"),
        })
    }
}

/// Borrow each bound value as a `ToSql` reference. `Option` carries the
/// concrete type, so NULL parameters bind with the right OID.
fn bind_params(params: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    params
        .iter()
        .map(|p| match p {
            SqlValue::Uuid(v) => v as &(dyn ToSql + Sync),
            SqlValue::BigInt(v) => v as &(dyn ToSql + Sync),
            SqlValue::Int(v) => v as &(dyn ToSql + Sync),
            SqlValue::Double(v) => v as &(dyn ToSql + Sync),
            SqlValue::Text(v) => v as &(dyn ToSql + Sync),
            SqlValue::Date(v) => v as &(dyn ToSql + Sync),
        })
        .collect()
}

/// Decode one wire row into the typed representation.
fn decode_row(row: &tokio_postgres::Row) -> Result<SqlRow, StoreError> {
    let mut decoded = SqlRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let value = match *column.type_() {
            Type::UUID => SqlValue::Uuid(try_get(row, idx, name)?),
            Type::INT8 => SqlValue::BigInt(try_get(row, idx, name)?),
            Type::INT2 | Type::INT4 => SqlValue::Int(try_get(row, idx, name)?),
            Type::FLOAT4 | Type::FLOAT8 => SqlValue::Double(try_get(row, idx, name)?),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR => SqlValue::Text(try_get(row, idx, name)?),
            Type::DATE => SqlValue::Date(try_get(row, idx, name)?),
            ref other => {
                return Err(StoreError::MissingColumn {
                    column: format!("{name} (unsupported type {other})"),
                })
            }
        };
        decoded = decoded.with(name, value);
    }
    Ok(decoded)
}

fn try_get<'a, T>(row: &'a tokio_postgres::Row, idx: usize, name: &str) -> Result<T, StoreError>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get(idx).map_err(|e| StoreError::MissingColumn {
        column: format!("{name}: {e}"),
    })
}

#[async_trait]
impl RelationalStore for PostgresStore {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> BeaconResult<Vec<SqlRow>> {
        let conn = self.get_conn().await?;
        let bound = bind_params(params);

        let rows = tokio::time::timeout(self.query_timeout, conn.query(sql, &bound))
            .await
            .map_err(|_| StoreError::Timeout {
                timeout: self.query_timeout,
            })?
            .map_err(|e| StoreError::Unavailable {
                reason: format!("query failed: {e}"),
            })?;

        tracing::debug!(rows = rows.len(), "store query completed");

        let mut decoded = Vec::with_capacity(rows.len());
        for row in &rows {
            decoded.push(decode_row(row)?);
        }
        Ok(decoded)
    }
}
