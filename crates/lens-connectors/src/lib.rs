//! # `AppLens` Connectors
//!
//! Samples heterogeneous data sources, infers a schema from the sample, and
//! aggregates rows into chart-ready series.
//!
//! Sources are uploaded CSV, JSON, or XLSX files, or live `PostgreSQL`,
//! `MySQL`, and `MongoDB` collections. Each is read through the
//! [`source::TabularSource`] trait; live databases push aggregation down.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

#[macro_use]
mod macros;

/// Group-and-reduce in ranked and insertion order, plus pushdown builders
pub mod aggregate;

/// Chart post-processing: pie folding, category limits, axis labels
pub mod chart;

/// Property maps and sampling bounds
pub mod config;

/// Ingestion, data fetch, and chart generation for a registered dataset
pub mod dataset;

/// Connector error types
pub mod error;

/// Type inference and schema extraction
pub mod schema;

/// File and database sources
pub mod source;

/// Summarizer seam
pub mod summary;

pub use aggregate::{AggregationMode, AggregationRequest, Bucket, ChartKind};
pub use chart::{CategoryLimit, ChartResponse};
pub use config::{ConnectorConfig, SamplerConfig};
pub use dataset::{fetch_data, generate_chart, ingest, ChartRequest, DatasetDescriptor};
pub use error::{ConnectorError, Result};
pub use schema::{FieldDescriptor, Record, Scalar, Schema, SchemaStrategy, TypeTag};
pub use source::{open_source, SourceKind, SourceLocation, TabularSource};
