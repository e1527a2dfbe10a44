//! `PostgreSQL` table source.
//!
//! Samples with `SELECT * ... LIMIT $1`, counts with `COUNT(*)`, and pushes
//! ranked aggregation down as a `GROUP BY` query. Each call opens its own
//! connection; the client is dropped (closing the connection) when the call
//! returns, whether it succeeded or not.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio_postgres::types::{FromSql, Kind, Type};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, info, warn};

use super::{limit_param, with_timeout, SourceCapabilities, TabularSource};
use crate::aggregate::sql::{build_aggregate_query, build_count_query, build_sample_query, SqlDialect};
use crate::aggregate::{AggregationRequest, Bucket, UNKNOWN_LABEL};
use crate::config::{validate_required, ConfigKeySpec, ConnectorConfig, SamplerConfig};
use crate::error::{ConnectorError, Result};
use crate::schema::{Record, Scalar};

const BACKEND: &str = "postgresql";

/// Default `PostgreSQL` port.
pub const DEFAULT_PORT: u16 = 5432;

/// Returns the configuration keys the `PostgreSQL` source recognises.
#[must_use]
pub fn config_key_specs() -> Vec<ConfigKeySpec> {
    vec![
        ConfigKeySpec::required("host", "PostgreSQL server hostname"),
        ConfigKeySpec::optional("port", "PostgreSQL server port", "5432"),
        ConfigKeySpec::required("database", "Database name"),
        ConfigKeySpec::required("user", "Login user"),
        ConfigKeySpec::optional("password", "Login password", ""),
        ConfigKeySpec::required("table", "Table to read (may be schema-qualified)"),
    ]
}

/// Connection settings for a `PostgreSQL` table.
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresConfig {
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

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("table", &self.table)
            .finish()
    }
}

impl PostgresConfig {
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

    fn to_pg_config(&self, connect_timeout: Duration) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.user)
            .connect_timeout(connect_timeout);
        if let Some(password) = &self.password {
            pg.password(password);
        }
        pg
    }
}

/// A [`TabularSource`] over one `PostgreSQL` table.
#[derive(Debug, Clone)]
pub struct PostgresSource {
    config: PostgresConfig,
    query_timeout: Duration,
    connect_timeout: Duration,
}

impl PostgresSource {
    /// Creates a source. Does not connect.
    #[must_use]
    pub fn new(config: PostgresConfig, sampler: &SamplerConfig) -> Self {
        Self {
            config,
            query_timeout: sampler.query_timeout,
            connect_timeout: sampler.connect_timeout,
        }
    }

    /// Returns the connection settings.
    #[must_use]
    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }

    async fn connect(&self) -> Result<Client> {
        let pg = self.config.to_pg_config(self.connect_timeout);
        let (client, connection) = with_timeout(BACKEND, self.connect_timeout, async {
            pg.connect(NoTls)
                .await
                .map_err(|e| ConnectorError::connection(BACKEND, e))
        })
        .await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "postgres connection task ended with error");
            }
        });

        info!(
            host = %self.config.host,
            port = self.config.port,
            database = %self.config.database,
            table = %self.config.table,
            "connected to postgres"
        );
        Ok(client)
    }

    async fn query_rows(&self, client: &Client, limit: usize) -> Result<Vec<Record>> {
        let sql = build_sample_query(SqlDialect::Postgres, &self.config.table);
        debug!(sql = %sql, limit, "postgres sample");
        let rows = with_timeout(BACKEND, self.query_timeout, async {
            client
                .query(&sql, &[&limit_param(limit)])
                .await
                .map_err(|e| ConnectorError::query(BACKEND, e))
        })
        .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn query_count(&self, client: &Client) -> Result<u64> {
        let sql = build_count_query(SqlDialect::Postgres, &self.config.table);
        debug!(sql = %sql, "postgres count");
        let row = with_timeout(BACKEND, self.query_timeout, async {
            client
                .query_one(&sql, &[])
                .await
                .map_err(|e| ConnectorError::query(BACKEND, e))
        })
        .await?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| ConnectorError::query(BACKEND, e))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl TabularSource for PostgresSource {
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
        let client = self.connect().await?;
        self.query_rows(&client, limit).await
    }

    async fn count(&self) -> Result<u64> {
        let client = self.connect().await?;
        self.query_count(&client).await
    }

    async fn aggregate(&self, request: &AggregationRequest) -> Result<Vec<Bucket>> {
        let client = self.connect().await?;
        let sql = build_aggregate_query(SqlDialect::Postgres, &self.config.table, request);
        debug!(sql = %sql, "postgres aggregate");
        let rows = with_timeout(BACKEND, self.query_timeout, async {
            client
                .query(&sql, &[])
                .await
                .map_err(|e| ConnectorError::query(BACKEND, e))
        })
        .await?;

        rows.iter()
            .map(|row| {
                let label: Option<String> = row
                    .try_get("label")
                    .map_err(|e| ConnectorError::query(BACKEND, e))?;
                let value: Option<f64> = row
                    .try_get("value")
                    .map_err(|e| ConnectorError::query(BACKEND, e))?;
                Ok(Bucket::new(
                    label.unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
                    value.unwrap_or(0.0),
                ))
            })
            .collect()
    }

    async fn sample_and_count(&self, limit: usize) -> Result<(Vec<Record>, u64)> {
        let client = self.connect().await?;
        let rows = self.query_rows(&client, limit).await?;
        let count = self.query_count(&client).await?;
        Ok((rows, count))
    }
}

// ── Row conversion ─────────────────────────────────────────────────

type DecodeError = Box<dyn std::error::Error + Sync + Send>;

/// Undecoded column bytes, accepted for any column type.
struct RawValue(Vec<u8>);

impl<'a> FromSql<'a> for RawValue {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, DecodeError> {
        Ok(Self(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn row_to_record(row: &Row) -> Result<Record> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let raw = row
                .try_get::<_, Option<RawValue>>(idx)
                .map_err(|e| ConnectorError::query(BACKEND, e))?;
            let value = match raw {
                Some(raw) => decode_value(col.type_(), &raw.0).map_err(|e| {
                    ConnectorError::query(BACKEND, format!("column '{}': {e}", col.name()))
                })?,
                None => Scalar::Null,
            };
            Ok((col.name().to_string(), value))
        })
        .collect()
}

/// Decodes one non-null binary-format value of type `ty`.
fn decode_value(ty: &Type, raw: &[u8]) -> std::result::Result<Scalar, DecodeError> {
    let value: Scalar = match *ty {
        Type::BOOL => bool::from_sql(ty, raw)?.into(),
        Type::INT2 => i64::from(i16::from_sql(ty, raw)?).into(),
        Type::INT4 => i64::from(i32::from_sql(ty, raw)?).into(),
        Type::INT8 => i64::from_sql(ty, raw)?.into(),
        Type::OID => i64::from(u32::from_sql(ty, raw)?).into(),
        Type::FLOAT4 => f64::from(f32::from_sql(ty, raw)?).into(),
        Type::FLOAT8 => f64::from_sql(ty, raw)?.into(),
        Type::DATE => Scalar::Date(
            chrono::NaiveDate::from_sql(ty, raw)?
                .format("%Y-%m-%d")
                .to_string(),
        ),
        Type::TIMESTAMP => Scalar::Date(
            chrono::NaiveDateTime::from_sql(ty, raw)?
                .format("%Y-%m-%dT%H:%M:%S%.3f")
                .to_string(),
        ),
        Type::TIMESTAMPTZ => Scalar::Date(
            chrono::DateTime::<chrono::Utc>::from_sql(ty, raw)?
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        ),
        Type::TIME => Scalar::Text(
            chrono::NaiveTime::from_sql(ty, raw)?
                .format("%H:%M:%S%.f")
                .to_string(),
        ),
        Type::TIMETZ => Scalar::Text(decode_timetz(raw).ok_or("invalid timetz")?),
        Type::INTERVAL => Scalar::Text(decode_interval(raw).ok_or("invalid interval")?),
        Type::JSON | Type::JSONB => Scalar::from(serde_json::Value::from_sql(ty, raw)?),
        Type::NUMERIC => Scalar::Text(decode_numeric(raw).ok_or("invalid numeric")?),
        Type::MONEY => Scalar::Text(format_money(i64::from_sql(&Type::INT8, raw)?)),
        Type::UUID => Scalar::Text(format_uuid(raw).ok_or("invalid uuid")?),
        Type::INET | Type::CIDR => Scalar::Text(decode_inet(raw).ok_or("invalid inet")?),
        Type::BYTEA => Scalar::Text(format_bytea(raw)),
        Type::CHAR => Scalar::Text(raw.first().map(|b| char::from(*b).to_string()).unwrap_or_default()),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN | Type::XML => {
            Scalar::Text(String::from_utf8(raw.to_vec())?)
        }
        _ => match ty.kind() {
            Kind::Array(elem) => Scalar::Text(decode_array(elem, raw)?.to_string()),
            Kind::Domain(base) => decode_value(base, raw)?,
            // Enums and extension types such as citext send their text form.
            Kind::Enum(_) => Scalar::Text(String::from_utf8(raw.to_vec())?),
            Kind::Simple if Type::from_oid(ty.oid()).is_none() => {
                Scalar::Text(String::from_utf8(raw.to_vec())?)
            }
            _ => {
                warn!(pg_type = %ty.name(), "unsupported postgres column type, reading as null");
                Scalar::Null
            }
        },
    };
    Ok(value)
}

fn read_i32(cursor: &mut &[u8]) -> std::result::Result<i32, DecodeError> {
    let (head, rest) = cursor.split_first_chunk::<4>().ok_or("truncated value")?;
    *cursor = rest;
    Ok(i32::from_be_bytes(*head))
}

/// Decodes a binary array into nested JSON, one level per dimension.
fn decode_array(elem: &Type, raw: &[u8]) -> std::result::Result<serde_json::Value, DecodeError> {
    let mut cursor = raw;
    let ndim = usize::try_from(read_i32(&mut cursor)?)?;
    let _has_nulls = read_i32(&mut cursor)?;
    let _elem_oid = read_i32(&mut cursor)?;

    let mut dims = Vec::with_capacity(ndim);
    for _ in 0..ndim {
        dims.push(usize::try_from(read_i32(&mut cursor)?)?);
        let _lower_bound = read_i32(&mut cursor)?;
    }
    let total = if dims.is_empty() { 0 } else { dims.iter().product() };

    let mut items = Vec::with_capacity(total);
    for _ in 0..total {
        let len = read_i32(&mut cursor)?;
        let Ok(len) = usize::try_from(len) else {
            items.push(serde_json::Value::Null);
            continue;
        };
        let bytes = cursor.get(..len).ok_or("truncated array element")?;
        cursor = &cursor[len..];
        items.push(serde_json::Value::from(&decode_value(elem, bytes)?));
    }
    Ok(nest_array(items, &dims))
}

fn nest_array(items: Vec<serde_json::Value>, dims: &[usize]) -> serde_json::Value {
    match dims {
        [_, inner @ ..] if !inner.is_empty() => {
            let stride = inner.iter().product::<usize>().max(1);
            serde_json::Value::Array(
                items
                    .chunks(stride)
                    .map(|chunk| nest_array(chunk.to_vec(), inner))
                    .collect(),
            )
        }
        _ => serde_json::Value::Array(items),
    }
}

/// `HH:MM:SS[.f]` followed by the UTC offset, e.g. `10:30:00+05:30`.
fn decode_timetz(raw: &[u8]) -> Option<String> {
    let micros = i64::from_be_bytes(raw.get(0..8)?.try_into().ok()?);
    // Stored as seconds west of UTC.
    let west = i32::from_be_bytes(raw.get(8..12)?.try_into().ok()?);
    let time = time_of_day(micros)?;

    let east = -i64::from(west);
    let sign = if east < 0 { '-' } else { '+' };
    let abs = east.unsigned_abs();
    let (h, m, s) = (abs / 3600, abs % 3600 / 60, abs % 60);
    let mut out = format!("{time}{sign}{h:02}");
    if m != 0 || s != 0 {
        out.push_str(&format!(":{m:02}"));
    }
    if s != 0 {
        out.push_str(&format!(":{s:02}"));
    }
    Some(out)
}

fn time_of_day(micros: i64) -> Option<String> {
    let secs = u32::try_from(micros.div_euclid(1_000_000)).ok()?;
    let nanos = u32::try_from(micros.rem_euclid(1_000_000) * 1_000).ok()?;
    chrono::NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
        .map(|t| t.format("%H:%M:%S%.f").to_string())
}

/// Renders an interval the way `psql` does: `1 year 2 mons 3 days 04:05:06`.
fn decode_interval(raw: &[u8]) -> Option<String> {
    let micros = i64::from_be_bytes(raw.get(0..8)?.try_into().ok()?);
    let days = i32::from_be_bytes(raw.get(8..12)?.try_into().ok()?);
    let months = i32::from_be_bytes(raw.get(12..16)?.try_into().ok()?);

    let unit = |n: i32, one: &str, many: &str| {
        format!("{n} {}", if n.abs() == 1 { one } else { many })
    };
    let mut parts = Vec::new();
    if months / 12 != 0 {
        parts.push(unit(months / 12, "year", "years"));
    }
    if months % 12 != 0 {
        parts.push(unit(months % 12, "mon", "mons"));
    }
    if days != 0 {
        parts.push(unit(days, "day", "days"));
    }
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let abs = micros.unsigned_abs();
        let (secs, frac) = (abs / 1_000_000, abs % 1_000_000);
        let mut clock = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs % 3600 / 60,
            secs % 60
        );
        if frac != 0 {
            clock.push('.');
            clock.push_str(format!("{frac:06}").trim_end_matches('0'));
        }
        parts.push(clock);
    }
    Some(parts.join(" "))
}

/// `inet`/`cidr`: address, plus `/bits` for networks and partial masks.
fn decode_inet(raw: &[u8]) -> Option<String> {
    let header = raw.get(..4)?;
    let (family, bits, is_cidr, len) = (header[0], header[1], header[2], usize::from(header[3]));
    let addr = raw.get(4..4 + len)?;
    let (ip, max_bits) = match family {
        2 => (IpAddr::from(<[u8; 4]>::try_from(addr).ok()?), 32),
        3 => (IpAddr::from(<[u8; 16]>::try_from(addr).ok()?), 128),
        _ => return None,
    };
    if is_cidr != 0 || bits != max_bits {
        Some(format!("{ip}/{bits}"))
    } else {
        Some(ip.to_string())
    }
}

/// `money` is a count of cents; rendered as plain decimal text.
fn format_money(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

fn format_bytea(raw: &[u8]) -> String {
    let mut out = String::with_capacity(2 + raw.len() * 2);
    out.push_str("\\x");
    for b in raw {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Renders a binary `NUMERIC` as decimal text, keeping its full precision.
fn decode_numeric(raw: &[u8]) -> Option<String> {
    let word = |i: usize| raw.get(i..i + 2).map(|b| u16::from_be_bytes([b[0], b[1]]));

    let ndigits = usize::from(word(0)?);
    #[allow(clippy::cast_possible_wrap)]
    let weight = i32::from(word(2)? as i16);
    let sign = word(4)?;
    let dscale = usize::from(word(6)?);

    match sign {
        0xC000 => return Some("NaN".to_string()),
        0xD000 => return Some("Infinity".to_string()),
        0xF000 => return Some("-Infinity".to_string()),
        _ => {}
    }

    let digits = (0..ndigits)
        .map(|i| word(8 + 2 * i))
        .collect::<Option<Vec<u16>>>()?;
    let digit_at = |group: i32| -> u16 {
        usize::try_from(group)
            .ok()
            .and_then(|g| digits.get(g).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == 0x4000 {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&digit_at(0).to_string());
        for group in 1..=weight {
            out.push_str(&format!("{:04}", digit_at(group)));
        }
    }

    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut group = weight + 1;
        while frac.len() < dscale {
            frac.push_str(&format!("{:04}", digit_at(group)));
            group += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }

    Some(out)
}

fn format_uuid(raw: &[u8]) -> Option<String> {
    if raw.len() != 16 {
        return None;
    }
    let hex: String = raw.iter().map(|b| format!("{b:02x}")).collect();
    Some(format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(ndigits: u16, weight: i16, sign: u16, dscale: u16, digits: &[u16]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&ndigits.to_be_bytes());
        out.extend_from_slice(&weight.to_be_bytes());
        out.extend_from_slice(&sign.to_be_bytes());
        out.extend_from_slice(&dscale.to_be_bytes());
        for d in digits {
            out.extend_from_slice(&d.to_be_bytes());
        }
        out
    }

    fn base_config() -> ConnectorConfig {
        ConnectorConfig::new("postgresql")
            .with("host", "db.internal")
            .with("database", "shop")
            .with("user", "app")
            .with("table", "orders")
    }

    #[test]
    fn test_from_config_defaults() {
        let cfg = PostgresConfig::from_config(&base_config()).unwrap();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.password, None);
        assert_eq!(cfg.table, "orders");
    }

    #[test]
    fn test_from_config_port_and_password() {
        let cfg = PostgresConfig::from_config(
            &base_config().with("port", "6543").with("password", "s3cret"),
        )
        .unwrap();
        assert_eq!(cfg.port, 6543);
        assert_eq!(cfg.password.as_deref(), Some("s3cret"));
        assert!(!format!("{cfg:?}").contains("s3cret"));
    }

    #[test]
    fn test_from_config_missing_keys() {
        let err = PostgresConfig::from_config(&ConnectorConfig::new("postgresql").with("host", "h"))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("database"));
        assert!(msg.contains("user"));
        assert!(msg.contains("table"));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_from_config_bad_port() {
        let err = PostgresConfig::from_config(&base_config().with("port", "99999")).unwrap_err();
        assert!(matches!(err, ConnectorError::ConfigurationError(_)));
    }

    #[test]
    fn test_config_key_specs() {
        let specs = config_key_specs();
        let required: Vec<&str> = specs
            .iter()
            .filter(|s| s.required)
            .map(|s| s.key.as_str())
            .collect();
        assert_eq!(required, vec!["host", "database", "user", "table"]);
    }

    #[test]
    fn test_source_capabilities() {
        let cfg = PostgresConfig::from_config(&base_config()).unwrap();
        let source = PostgresSource::new(cfg, &SamplerConfig::default());
        assert!(source.capabilities().supports_aggregate_pushdown);
        assert_eq!(source.source_name(), "postgresql");
    }

    #[test]
    fn test_decode_numeric() {
        assert_eq!(
            decode_numeric(&numeric(2, 0, 0, 2, &[123, 4500])).as_deref(),
            Some("123.45")
        );
        assert_eq!(
            decode_numeric(&numeric(1, -1, 0x4000, 2, &[500])).as_deref(),
            Some("-0.05")
        );
        assert_eq!(
            decode_numeric(&numeric(1, -2, 0, 5, &[5000])).as_deref(),
            Some("0.00005")
        );
        assert_eq!(
            decode_numeric(&numeric(1, 1, 0, 0, &[1])).as_deref(),
            Some("10000")
        );
        assert_eq!(
            decode_numeric(&numeric(2, 1, 0, 0, &[1234, 5678])).as_deref(),
            Some("12345678")
        );
        assert_eq!(decode_numeric(&numeric(0, 0, 0, 0, &[])).as_deref(), Some("0"));
        assert_eq!(
            decode_numeric(&numeric(0, 0, 0xC000, 0, &[])).as_deref(),
            Some("NaN")
        );
        assert_eq!(decode_numeric(&[0, 1]), None);
    }

    #[test]
    fn test_decode_time_types() {
        let ten_thirty = (10 * 3600 + 30 * 60) * 1_000_000_i64;
        assert_eq!(
            decode_value(&Type::TIME, &ten_thirty.to_be_bytes()).unwrap(),
            Scalar::Text("10:30:00".into())
        );

        let mut timetz = (ten_thirty + 500_000).to_be_bytes().to_vec();
        timetz.extend_from_slice(&(-19_800_i32).to_be_bytes());
        assert_eq!(
            decode_value(&Type::TIMETZ, &timetz).unwrap(),
            Scalar::Text("10:30:00.500+05:30".into())
        );

        let mut interval = ((4 * 3600 + 5 * 60 + 6) * 1_000_000_i64).to_be_bytes().to_vec();
        interval.extend_from_slice(&3_i32.to_be_bytes());
        interval.extend_from_slice(&14_i32.to_be_bytes());
        assert_eq!(
            decode_value(&Type::INTERVAL, &interval).unwrap(),
            Scalar::Text("1 year 2 mons 3 days 04:05:06".into())
        );
        assert_eq!(decode_interval(&[0; 16]).as_deref(), Some("00:00:00"));
    }

    #[test]
    fn test_decode_network_money_bytes() {
        assert_eq!(
            decode_value(&Type::INET, &[2, 32, 0, 4, 10, 0, 0, 1]).unwrap(),
            Scalar::Text("10.0.0.1".into())
        );
        assert_eq!(
            decode_value(&Type::CIDR, &[2, 24, 1, 4, 192, 168, 1, 0]).unwrap(),
            Scalar::Text("192.168.1.0/24".into())
        );
        assert_eq!(
            decode_value(&Type::MONEY, &(-123_450_i64).to_be_bytes()).unwrap(),
            Scalar::Text("-1234.50".into())
        );
        assert_eq!(
            decode_value(&Type::BYTEA, &[0xde, 0xad, 0x01]).unwrap(),
            Scalar::Text("\\xdead01".into())
        );
        assert_eq!(
            decode_value(&Type::VARCHAR, b"plain").unwrap(),
            Scalar::Text("plain".into())
        );
    }

    #[test]
    fn test_decode_int_array_with_null() {
        let mut raw = Vec::new();
        for word in [1_i32, 1, 23, 3, 1] {
            raw.extend_from_slice(&word.to_be_bytes());
        }
        raw.extend_from_slice(&4_i32.to_be_bytes());
        raw.extend_from_slice(&7_i32.to_be_bytes());
        raw.extend_from_slice(&(-1_i32).to_be_bytes());
        raw.extend_from_slice(&4_i32.to_be_bytes());
        raw.extend_from_slice(&9_i32.to_be_bytes());

        assert_eq!(
            decode_value(&Type::INT4_ARRAY, &raw).unwrap(),
            Scalar::Text("[7,null,9]".into())
        );

        let mut empty = Vec::new();
        for word in [0_i32, 0, 23] {
            empty.extend_from_slice(&word.to_be_bytes());
        }
        assert_eq!(
            decode_value(&Type::INT4_ARRAY, &empty).unwrap(),
            Scalar::Text("[]".into())
        );
        assert!(decode_value(&Type::INT4_ARRAY, &raw[..10]).is_err());
    }

    #[test]
    fn test_nest_array_two_dims() {
        let items: Vec<serde_json::Value> = (1..=6).map(serde_json::Value::from).collect();
        assert_eq!(
            nest_array(items, &[2, 3]),
            serde_json::json!([[1, 2, 3], [4, 5, 6]])
        );
    }

    #[test]
    fn test_decode_enum_and_unsupported() {
        let mood = Type::new(
            "mood".into(),
            90_001,
            Kind::Enum(vec!["happy".into(), "sad".into()]),
            "public".into(),
        );
        assert_eq!(
            decode_value(&mood, b"happy").unwrap(),
            Scalar::Text("happy".into())
        );
        assert_eq!(decode_value(&Type::POINT, &[0; 16]).unwrap(), Scalar::Null);
    }

    #[test]
    fn test_format_uuid() {
        let raw: Vec<u8> = (0u8..16).collect();
        assert_eq!(
            format_uuid(&raw).as_deref(),
            Some("00010203-0405-0607-0809-0a0b0c0d0e0f")
        );
        assert_eq!(format_uuid(&raw[..4]), None);
    }
}
