//! Source Sampler: one row-sample / count / aggregate interface over files
//! and live databases.
//!
//! - [`TabularSource`]: the capability trait every backend implements
//! - [`SourceKind`]: the six recognised source kinds
//! - [`ConnectionDetails`]: the connection block carried by a dataset
//!   descriptor
//! - [`open_source`]: factory from kind + location to a boxed source
//!
//! Live backends open one connection per call and always close it, on the
//! error path too. Every database round-trip is bounded by
//! [`SamplerConfig::query_timeout`](crate::config::SamplerConfig).

pub mod file;
#[cfg(feature = "mongodb")]
pub mod mongo;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::aggregate::{AggregationRequest, Bucket};
use crate::config::{ConnectorConfig, SamplerConfig};
use crate::error::{ConnectorError, Result};
use crate::schema::Record;

// ── Source kinds ───────────────────────────────────────────────────

/// Kind of data source behind a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Comma-separated file with a header row.
    Csv,
    /// JSON array of objects, or a single object.
    Json,
    /// Excel workbook; the first sheet is read.
    Xlsx,
    /// `PostgreSQL` table.
    Postgres,
    /// `MySQL` table.
    MySql,
    /// `MongoDB` collection.
    MongoDb,
}

str_enum!(SourceKind, lowercase_nodot, UnsupportedSource, "unknown source kind",
    Csv => "csv";
    Json => "json";
    Xlsx => "xlsx";
    Postgres => "postgresql", "postgres";
    MySql => "mysql";
    MongoDb => "mongodb", "mongo"
);

impl SourceKind {
    /// Returns `true` for file-backed kinds.
    #[must_use]
    pub const fn is_file(self) -> bool {
        matches!(self, Self::Csv | Self::Json | Self::Xlsx)
    }
}

// ── Capability trait ───────────────────────────────────────────────

/// What a source can do natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceCapabilities {
    /// Grouping and reduction run inside the backend.
    pub supports_aggregate_pushdown: bool,
    /// Every call reads the entire source into memory.
    pub loads_entire_source: bool,
}

/// A readable tabular source.
///
/// `sample` returns rows in source order. An empty source yields
/// `Ok(vec![])`, never an error.
#[async_trait]
pub trait TabularSource: Send + Sync {
    /// Short backend name for logs and errors.
    fn source_name(&self) -> &str;

    /// Native capabilities of this source.
    fn capabilities(&self) -> SourceCapabilities;

    /// Returns up to `limit` rows.
    ///
    /// # Errors
    ///
    /// Returns a connection, query, parse, or timeout error.
    async fn sample(&self, limit: usize) -> Result<Vec<Record>>;

    /// Returns the total number of rows.
    ///
    /// # Errors
    ///
    /// Returns a connection, query, parse, or timeout error.
    async fn count(&self) -> Result<u64>;

    /// Groups and reduces the whole source in ranked mode: value-descending,
    /// at most [`RANKED_LIMIT`](crate::aggregate::RANKED_LIMIT) buckets.
    ///
    /// # Errors
    ///
    /// Returns a connection, query, parse, or timeout error.
    async fn aggregate(&self, request: &AggregationRequest) -> Result<Vec<Bucket>>;

    /// Samples `limit` rows and counts the source, once each.
    ///
    /// Live backends override this to reuse a single connection.
    ///
    /// # Errors
    ///
    /// Returns the first error from either step.
    async fn sample_and_count(&self, limit: usize) -> Result<(Vec<Record>, u64)> {
        let rows = self.sample(limit).await?;
        let count = self.count().await?;
        Ok((rows, count))
    }
}

// ── Connection details ─────────────────────────────────────────────

/// Connection block of a live-database dataset descriptor.
///
/// Relational sources use host/port/database/user/password/table; document
/// sources use `uri` (or host/port/user/password) plus database/collection.
/// `port` may be given as a number or a string.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetails {
    /// Server host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Server port.
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub port: Option<String>,
    /// Database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Login user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Login password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Relational table, optionally schema-qualified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Document-store connection URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Document collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl fmt::Debug for ConnectionDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDetails")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("table", &self.table)
            .field("uri", &self.uri.as_ref().map(|_| "***"))
            .field("collection", &self.collection)
            .finish()
    }
}

impl ConnectionDetails {
    /// Flattens the details into a [`ConnectorConfig`] for `kind`.
    #[must_use]
    pub fn to_connector_config(&self, kind: SourceKind) -> ConnectorConfig {
        let pairs = [
            ("host", &self.host),
            ("port", &self.port),
            ("database", &self.database),
            ("user", &self.user),
            ("password", &self.password),
            ("table", &self.table),
            ("uri", &self.uri),
            ("collection", &self.collection),
        ];
        pairs
            .into_iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k, v)))
            .fold(ConnectorConfig::new(kind.to_string()), |cfg, (k, v)| {
                cfg.with(k, v.clone())
            })
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

// ── Factory ────────────────────────────────────────────────────────

/// Where a source's data lives.
#[derive(Debug, Clone)]
pub enum SourceLocation {
    /// A file on local disk.
    File(PathBuf),
    /// A live database described by a property map.
    Database(ConnectorConfig),
}

/// Opens a source of the given kind.
///
/// No I/O happens here; connections are opened per call.
///
/// # Errors
///
/// - [`ConnectorError::UnsupportedSource`] if the kind and location do not
///   match, or the backend is not compiled in
/// - [`ConnectorError::MissingConfig`] / [`ConnectorError::ConfigurationError`]
///   if a database config is incomplete or invalid
pub fn open_source(
    kind: SourceKind,
    location: SourceLocation,
    sampler: &SamplerConfig,
) -> Result<Box<dyn TabularSource>> {
    match (kind, location) {
        (k, SourceLocation::File(path)) if k.is_file() => {
            Ok(Box::new(file::FileSource::open(path)?))
        }
        #[cfg(feature = "postgres")]
        (SourceKind::Postgres, SourceLocation::Database(config)) => Ok(Box::new(
            postgres::PostgresSource::new(postgres::PostgresConfig::from_config(&config)?, sampler),
        )),
        #[cfg(feature = "mysql")]
        (SourceKind::MySql, SourceLocation::Database(config)) => Ok(Box::new(
            mysql::MySqlSource::new(mysql::MySqlConfig::from_config(&config)?, sampler),
        )),
        #[cfg(feature = "mongodb")]
        (SourceKind::MongoDb, SourceLocation::Database(config)) => Ok(Box::new(
            mongo::MongoSource::new(mongo::MongoConfig::from_config(&config)?, sampler),
        )),
        (k, SourceLocation::File(_)) => Err(ConnectorError::UnsupportedSource(format!(
            "{k} is not a file source"
        ))),
        (k, SourceLocation::Database(_)) if k.is_file() => Err(ConnectorError::UnsupportedSource(
            format!("{k} is not a database source"),
        )),
        #[allow(unreachable_patterns)]
        (k, SourceLocation::Database(_)) => {
            let _ = sampler;
            Err(ConnectorError::UnsupportedSource(format!(
                "{k} support is not compiled in"
            )))
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Runs `fut`, failing with [`ConnectorError::Timeout`] after `after`.
pub(crate) async fn with_timeout<T, F>(backend: &'static str, after: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| ConnectorError::Timeout { backend, after })?
}

/// Converts a caller row limit into a bound SQL parameter.
#[cfg(any(feature = "postgres", feature = "mysql", feature = "mongodb"))]
pub(crate) fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
