//! `MySQL` table source.
//!
//! Same shape as the `PostgreSQL` source with backtick quoting and `?`
//! placeholders. Every call disconnects explicitly before returning; a
//! failed disconnect is logged and does not mask the call's own result.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use mysql_async::consts::ColumnType;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, Row, Value};
use tracing::{debug, info, warn};

use super::{limit_param, with_timeout, SourceCapabilities, TabularSource};
use crate::aggregate::sql::{build_aggregate_query, build_count_query, build_sample_query, SqlDialect};
use crate::aggregate::{AggregationRequest, Bucket, UNKNOWN_LABEL};
use crate::config::{validate_required, ConfigKeySpec, ConnectorConfig, SamplerConfig};
use crate::error::{ConnectorError, Result};
use crate::schema::{Record, Scalar};

const BACKEND: &str = "mysql";

/// Default `MySQL` port.
pub const DEFAULT_PORT: u16 = 3306;

/// Returns the configuration keys the `MySQL` source recognises.
#[must_use]
pub fn config_key_specs() -> Vec<ConfigKeySpec> {
    vec![
        ConfigKeySpec::required("host", "MySQL server hostname"),
        ConfigKeySpec::optional("port", "MySQL server port", "3306"),
        ConfigKeySpec::required("database", "Database name"),
        ConfigKeySpec::required("user", "Login user"),
        ConfigKeySpec::optional("password", "Login password", ""),
        ConfigKeySpec::required("table", "Table to read"),
    ]
}

/// Connection settings for a `MySQL` table.
#[derive(Clone, PartialEq, Eq)]
pub struct MySqlConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Login user.
    pub user: String,
    /// Login password, if any.
    pub password: Option<String>,
    /// Table name.
    pub table: String,
}

impl fmt::Debug for MySqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("table", &self.table)
            .finish()
    }
}

impl MySqlConfig {
    /// Builds a config from a property map.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::MissingConfig`] naming every absent
    /// required key, or [`ConnectorError::ConfigurationError`] for an
    /// invalid port.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self> {
        validate_required(config, &config_key_specs())?;
        Ok(Self {
            host: config.require("host")?.to_string(),
            port: config.get_parsed::<u16>("port")?.unwrap_or(DEFAULT_PORT),
            database: config.require("database")?.to_string(),
            user: config.require("user")?.to_string(),
            password: config.get("password").map(str::to_string),
            table: config.require("table")?.to_string(),
        })
    }

    fn to_opts(&self) -> OptsBuilder {
        OptsBuilder::default()
            .ip_or_hostname(self.host.clone())
            .tcp_port(self.port)
            .db_name(Some(self.database.clone()))
            .user(Some(self.user.clone()))
            .pass(self.password.clone())
    }
}

/// A [`TabularSource`] over one `MySQL` table.
#[derive(Debug, Clone)]
pub struct MySqlSource {
    config: MySqlConfig,
    query_timeout: Duration,
    connect_timeout: Duration,
}

impl MySqlSource {
    /// Creates a source. Does not connect.
    #[must_use]
    pub fn new(config: MySqlConfig, sampler: &SamplerConfig) -> Self {
        Self {
            config,
            query_timeout: sampler.query_timeout,
            connect_timeout: sampler.connect_timeout,
        }
    }

    /// Returns the connection settings.
    #[must_use]
    pub fn config(&self) -> &MySqlConfig {
        &self.config
    }

    async fn connect(&self) -> Result<Conn> {
        let opts = self.config.to_opts();
        let conn = with_timeout(BACKEND, self.connect_timeout, async {
            Conn::new(opts)
                .await
                .map_err(|e| ConnectorError::connection(BACKEND, e))
        })
        .await?;
        info!(
            host = %self.config.host,
            port = self.config.port,
            database = %self.config.database,
            table = %self.config.table,
            "connected to mysql"
        );
        Ok(conn)
    }

    async fn release(conn: Conn) {
        if let Err(e) = conn.disconnect().await {
            warn!(error = %e, "mysql disconnect failed");
        }
    }

    async fn query_rows(&self, conn: &mut Conn, limit: usize) -> Result<Vec<Record>> {
        let sql = build_sample_query(SqlDialect::MySql, &self.config.table);
        debug!(sql = %sql, limit, "mysql sample");
        let rows: Vec<Row> = with_timeout(BACKEND, self.query_timeout, async {
            conn.exec(sql.as_str(), (limit_param(limit),))
                .await
                .map_err(|e| ConnectorError::query(BACKEND, e))
        })
        .await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn query_count(&self, conn: &mut Conn) -> Result<u64> {
        let sql = build_count_query(SqlDialect::MySql, &self.config.table);
        debug!(sql = %sql, "mysql count");
        let count: Option<i64> = with_timeout(BACKEND, self.query_timeout, async {
            conn.exec_first(sql.as_str(), ())
                .await
                .map_err(|e| ConnectorError::query(BACKEND, e))
        })
        .await?;
        Ok(count.and_then(|c| u64::try_from(c).ok()).unwrap_or(0))
    }

    async fn query_buckets(
        &self,
        conn: &mut Conn,
        request: &AggregationRequest,
    ) -> Result<Vec<Bucket>> {
        let sql = build_aggregate_query(SqlDialect::MySql, &self.config.table, request);
        debug!(sql = %sql, "mysql aggregate");
        let rows: Vec<Row> = with_timeout(BACKEND, self.query_timeout, async {
            conn.exec(sql.as_str(), ())
                .await
                .map_err(|e| ConnectorError::query(BACKEND, e))
        })
        .await?;
        Ok(rows.iter().map(row_to_bucket).collect())
    }
}

#[async_trait]
impl TabularSource for MySqlSource {
    #[allow(clippy::unnecessary_literal_bound)]
    fn source_name(&self) -> &str {
        BACKEND
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            supports_aggregate_pushdown: true,
            loads_entire_source: false,
        }
    }

    async fn sample(&self, limit: usize) -> Result<Vec<Record>> {
        let mut conn = self.connect().await?;
        let result = self.query_rows(&mut conn, limit).await;
        Self::release(conn).await;
        result
    }

    async fn count(&self) -> Result<u64> {
        let mut conn = self.connect().await?;
        let result = self.query_count(&mut conn).await;
        Self::release(conn).await;
        result
    }

    async fn aggregate(&self, request: &AggregationRequest) -> Result<Vec<Bucket>> {
        let mut conn = self.connect().await?;
        let result = self.query_buckets(&mut conn, request).await;
        Self::release(conn).await;
        result
    }

    async fn sample_and_count(&self, limit: usize) -> Result<(Vec<Record>, u64)> {
        let mut conn = self.connect().await?;
        let result = match self.query_rows(&mut conn, limit).await {
            Ok(rows) => self.query_count(&mut conn).await.map(|c| (rows, c)),
            Err(e) => Err(e),
        };
        Self::release(conn).await;
        result
    }
}

// ── Row conversion ─────────────────────────────────────────────────

fn row_to_record(row: &Row) -> Record {
    row.columns_ref()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let date_only = col.column_type() == ColumnType::MYSQL_TYPE_DATE;
            let value = row
                .as_ref(idx)
                .map_or(Scalar::Null, |v| value_to_scalar(v, date_only));
            (col.name_str().into_owned(), value)
        })
        .collect()
}

fn row_to_bucket(row: &Row) -> Bucket {
    let label = row
        .as_ref(0)
        .map(|v| value_to_scalar(v, false))
        .and_then(|s| s.to_label())
        .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
    let value = row
        .as_ref(1)
        .map(|v| value_to_scalar(v, false))
        .and_then(|s| s.as_f64_lenient())
        .unwrap_or(0.0);
    Bucket::new(label, value)
}

/// Converts a binary-protocol value. Decimal and string columns arrive as
/// bytes and stay text; non-UTF-8 blobs become null.
#[allow(clippy::cast_precision_loss)]
fn value_to_scalar(value: &Value, date_only: bool) -> Scalar {
    match value {
        Value::NULL => Scalar::Null,
        Value::Int(i) => Scalar::Integer(*i),
        Value::UInt(u) => {
            i64::try_from(*u).map_or_else(|_| Scalar::Float(*u as f64), Scalar::Integer)
        }
        Value::Float(f) => Scalar::Float(f64::from(*f)),
        Value::Double(d) => Scalar::Float(*d),
        Value::Bytes(bytes) => String::from_utf8(bytes.clone()).map_or(Scalar::Null, Scalar::Text),
        Value::Date(y, mo, d, h, mi, s, us) => {
            if date_only {
                Scalar::Date(format!("{y:04}-{mo:02}-{d:02}"))
            } else if *us == 0 {
                Scalar::Date(format!("{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}:{s:02}"))
            } else {
                Scalar::Date(format!(
                    "{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}:{s:02}.{us:06}"
                ))
            }
        }
        Value::Time(neg, days, h, mi, s, _us) => {
            let hours = days * 24 + u32::from(*h);
            let sign = if *neg { "-" } else { "" };
            Scalar::Text(format!("{sign}{hours:02}:{mi:02}:{s:02}"))
        }
    }
}
