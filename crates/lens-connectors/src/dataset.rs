//! Dataset façade.
//!
//! The entry points the HTTP layer calls: ingest a newly registered
//! dataset, fetch its rows, and generate a chart. Each call opens its own
//! source, so nothing is cached between calls; the schema computed at
//! ingestion is what the caller persists.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::{AggregationRequest, ChartKind};
use crate::chart::ChartResponse;
use crate::config::SamplerConfig;
use crate::error::{ConnectorError, Result};
use crate::schema::{infer_schema_with, Record, Schema};
use crate::source::file::detect_format;
use crate::source::{open_source, ConnectionDetails, SourceKind, SourceLocation, TabularSource};

/// A registered dataset, as stored by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetDescriptor {
    /// Display name. Doubles as the table or collection name for charts
    /// when the connection details carry neither.
    pub name: String,
    /// Source kind as stored (`csv`, `postgresql`, ...).
    pub source_type: String,
    /// Local path of an uploaded file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    /// Live-database connection block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_details: Option<ConnectionDetails>,
    /// Schema persisted at ingestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    /// Row count persisted at ingestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_count: Option<u64>,
}

impl DatasetDescriptor {
    /// Describes an uploaded file, detecting its kind from the extension.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::UnsupportedSource`] for an unrecognised
    /// extension.
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let kind = detect_format(&path)?;
        Ok(Self {
            name: name.into(),
            source_type: kind.to_string(),
            file_path: Some(path),
            connection_details: None,
            schema: None,
            records_count: None,
        })
    }

    /// Describes a live database.
    #[must_use]
    pub fn database(
        name: impl Into<String>,
        kind: SourceKind,
        connection_details: ConnectionDetails,
    ) -> Self {
        Self {
            name: name.into(),
            source_type: kind.to_string(),
            file_path: None,
            connection_details: Some(connection_details),
            schema: None,
            records_count: None,
        }
    }

    /// Parses the stored source type.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::UnsupportedSource`] for an unknown kind.
    pub fn kind(&self) -> Result<SourceKind> {
        self.source_type.parse()
    }

    /// Resolves where the data lives.
    ///
    /// With `name_fallback`, a missing table or collection name is taken
    /// from the other one, then from the dataset name.
    fn location(&self, kind: SourceKind, name_fallback: bool) -> Result<SourceLocation> {
        if kind.is_file() {
            let path = self.file_path.clone().ok_or_else(|| {
                ConnectorError::MissingConfig(format!(
                    "file path not found for dataset '{}'",
                    self.name
                ))
            })?;
            return Ok(SourceLocation::File(path));
        }

        let mut details = self.connection_details.clone().ok_or_else(|| {
            ConnectorError::MissingConfig(format!(
                "connection details not found for dataset '{}'",
                self.name
            ))
        })?;
        if name_fallback {
            let object = details
                .table
                .clone()
                .or_else(|| details.collection.clone())
                .unwrap_or_else(|| self.name.clone());
            if kind == SourceKind::MongoDb {
                details.collection.get_or_insert(object);
            } else {
                details.table.get_or_insert(object);
            }
        }
        Ok(SourceLocation::Database(details.to_connector_config(kind)))
    }

    fn open(&self, sampler: &SamplerConfig, name_fallback: bool) -> Result<Box<dyn TabularSource>> {
        let kind = self.kind()?;
        open_source(kind, self.location(kind, name_fallback)?, sampler)
    }
}

// ── Ingestion ──────────────────────────────────────────────────────

/// What ingestion learned about a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionReport {
    /// Inferred schema.
    pub schema: Schema,
    /// Total rows in the source.
    pub records_count: u64,
    /// First few rows, echoed back to the caller.
    #[serde(rename = "sampleData")]
    pub preview: Vec<Record>,
}

/// Samples a new dataset, infers its schema, and counts its rows.
///
/// Files are parsed once in full: the schema comes from the first
/// `schema_sample_rows` rows and the count is exact. Live databases are
/// sampled with `connect_sample_rows` and counted once over the same
/// connection. An empty source yields an empty schema, not an error.
///
/// # Errors
///
/// Returns an unsupported-source or config error before any I/O, or the
/// source's parse, connection, query, or timeout error.
pub async fn ingest(
    descriptor: &DatasetDescriptor,
    sampler: &SamplerConfig,
) -> Result<IngestionReport> {
    let source = descriptor.open(sampler, false)?;
    let sample_rows = if source.capabilities().loads_entire_source {
        usize::MAX
    } else {
        sampler.connect_sample_rows
    };

    let (mut rows, records_count) = source.sample_and_count(sample_rows).await?;
    let schema_rows = &rows[..rows.len().min(sampler.schema_sample_rows)];
    let schema = infer_schema_with(schema_rows, sampler.schema_strategy);
    rows.truncate(sampler.preview_rows);

    info!(
        dataset = %descriptor.name,
        source = source.source_name(),
        fields = schema.len(),
        records_count,
        "ingested dataset"
    );
    Ok(IngestionReport {
        schema,
        records_count,
        preview: rows,
    })
}

/// Returns up to `limit` rows (default `default_fetch_limit`) in source
/// order.
///
/// # Errors
///
/// Same as [`ingest`].
pub async fn fetch_data(
    descriptor: &DatasetDescriptor,
    limit: Option<usize>,
    sampler: &SamplerConfig,
) -> Result<Vec<Record>> {
    let limit = limit.unwrap_or(sampler.default_fetch_limit);
    let source = descriptor.open(sampler, false)?;
    let rows = source.sample(limit).await?;
    debug!(dataset = %descriptor.name, limit, rows = rows.len(), "fetched rows");
    Ok(rows)
}

// ── Charts ─────────────────────────────────────────────────────────

/// A chart-generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRequest {
    /// One of `bar`, `line`, `pie`, `scatter`, `area`.
    pub chart_type: String,
    /// X-axis field.
    pub x_field: String,
    /// Field to sum; counts rows when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_field: Option<String>,
    /// Field to group on; defaults to `x_field`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
}

impl ChartRequest {
    /// Checks the chart type and the x field, and returns the parsed kind.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::MissingConfig`] for an empty chart type or
    /// x field, or [`ConnectorError::ConfigurationError`] for an unknown
    /// chart type.
    pub fn validate(&self) -> Result<ChartKind> {
        if self.chart_type.trim().is_empty() || self.x_field.trim().is_empty() {
            return Err(ConnectorError::MissingConfig(
                "chart request requires chartType and xField".into(),
            ));
        }
        self.chart_type.parse()
    }

    /// Field the buckets are grouped on.
    #[must_use]
    pub fn group_field(&self) -> &str {
        self.group_by
            .as_deref()
            .filter(|g| !g.is_empty())
            .unwrap_or(&self.x_field)
    }

    fn y_field(&self) -> Option<&str> {
        self.y_field.as_deref().filter(|y| !y.is_empty())
    }
}

/// Aggregates a dataset into a chart payload in ranked mode.
///
/// Live databases run the aggregation natively; files are reduced in
/// memory. Either way the result is value-descending and capped at
/// [`RANKED_LIMIT`](crate::aggregate::RANKED_LIMIT) buckets.
///
/// # Errors
///
/// Returns a request validation error before any I/O, otherwise the
/// source's error.
pub async fn generate_chart(
    descriptor: &DatasetDescriptor,
    request: &ChartRequest,
    sampler: &SamplerConfig,
) -> Result<ChartResponse> {
    let chart_type = request.validate()?;
    let source = descriptor.open(sampler, true)?;
    let aggregation = AggregationRequest::new(
        request.group_field(),
        request.y_field().map(str::to_string),
        chart_type,
    );

    let buckets = source.aggregate(&aggregation).await?;
    info!(
        dataset = %descriptor.name,
        source = source.source_name(),
        pushdown = source.capabilities().supports_aggregate_pushdown,
        %chart_type,
        group = %aggregation.group_field,
        buckets = buckets.len(),
        "generated chart"
    );
    Ok(ChartResponse::new(
        chart_type,
        &request.x_field,
        request.y_field(),
        request.group_field(),
        buckets,
    ))
}
