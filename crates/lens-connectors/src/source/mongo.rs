//! `MongoDB` collection source.
//!
//! Samples with `find({}).limit(n)`, counts with `countDocuments`, and pushes
//! ranked aggregation down as an aggregation pipeline. The client is shut
//! down at the end of every call, on the error path too.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use tracing::{debug, info};

use super::{limit_param, with_timeout, SourceCapabilities, TabularSource};
use crate::aggregate::pipeline::{bucket_from_document, build_aggregate_pipeline};
use crate::aggregate::{AggregationRequest, Bucket};
use crate::config::{ConfigKeySpec, ConnectorConfig, SamplerConfig};
use crate::error::{ConnectorError, Result};
use crate::schema::{Record, Scalar};

const BACKEND: &str = "mongodb";

/// Default `MongoDB` port, used when the URI is assembled from parts.
pub const DEFAULT_PORT: u16 = 27017;

/// Returns the configuration keys the `MongoDB` source recognises.
///
/// Either `uri` or `host` must be present.
#[must_use]
pub fn config_key_specs() -> Vec<ConfigKeySpec> {
    vec![
        ConfigKeySpec::optional("uri", "Connection URI (mongodb:// or mongodb+srv://)", ""),
        ConfigKeySpec::optional("host", "Server host, when no URI is given", ""),
        ConfigKeySpec::optional("port", "Server port, when no URI is given", "27017"),
        ConfigKeySpec::optional("user", "Login user, when no URI is given", ""),
        ConfigKeySpec::optional("password", "Login password, when no URI is given", ""),
        ConfigKeySpec::required("database", "Database name"),
        ConfigKeySpec::required("collection", "Collection to read"),
    ]
}

/// Connection settings for a `MongoDB` collection.
#[derive(Clone, PartialEq, Eq)]
pub struct MongoConfig {
    /// Connection URI.
    pub uri: String,
    /// Database name.
    pub database: String,
    /// Collection name.
    pub collection: String,
}

impl fmt::Debug for MongoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoConfig")
            .field("uri", &"***")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .finish()
    }
}

impl MongoConfig {
    /// Builds a config from a property map.
    ///
    /// Uses `uri` when present; otherwise assembles
    /// `mongodb://[user[:password]@]host:port` from the parts.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::MissingConfig`] if the database, the
    /// collection, or both `uri` and `host` are missing, or
    /// [`ConnectorError::ConfigurationError`] for an invalid port.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self> {
        let mut missing = Vec::new();
        if config.get("uri").is_none() && config.get("host").is_none() {
            missing.push("uri (or host)".to_string());
        }
        for spec in config_key_specs().into_iter().filter(|s| s.required) {
            if config.get(&spec.key).is_none() {
                missing.push(spec.key);
            }
        }
        if !missing.is_empty() {
            return Err(ConnectorError::MissingConfig(format!(
                "{} requires {}",
                config.connector_type(),
                missing.join(", ")
            )));
        }

        let uri = match config.get("uri") {
            Some(uri) => uri.to_string(),
            None => {
                let host = config.require("host")?;
                let port = config.get_parsed::<u16>("port")?.unwrap_or(DEFAULT_PORT);
                let auth = match (config.get("user"), config.get("password")) {
                    (Some(user), Some(pass)) => {
                        format!("{}:{}@", percent_encode(user), percent_encode(pass))
                    }
                    (Some(user), None) => format!("{}@", percent_encode(user)),
                    (None, _) => String::new(),
                };
                format!("mongodb://{auth}{host}:{port}")
            }
        };

        Ok(Self {
            uri,
            database: config.require("database")?.to_string(),
            collection: config.require("collection")?.to_string(),
        })
    }
}

/// Percent-encodes URI userinfo, keeping only unreserved characters.
fn percent_encode(s: &str) -> String {
    s.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}

/// A [`TabularSource`] over one `MongoDB` collection.
#[derive(Debug, Clone)]
pub struct MongoSource {
    config: MongoConfig,
    query_timeout: Duration,
    connect_timeout: Duration,
}

impl MongoSource {
    /// Creates a source. Does not connect.
    #[must_use]
    pub fn new(config: MongoConfig, sampler: &SamplerConfig) -> Self {
        Self {
            config,
            query_timeout: sampler.query_timeout,
            connect_timeout: sampler.connect_timeout,
        }
    }

    /// Returns the connection settings.
    #[must_use]
    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    async fn connect(&self) -> Result<Client> {
        let mut options = with_timeout(BACKEND, self.connect_timeout, async {
            ClientOptions::parse(&self.config.uri)
                .await
                .map_err(|e| ConnectorError::connection(BACKEND, e))
        })
        .await?;
        options.connect_timeout = Some(self.connect_timeout);
        options.server_selection_timeout = Some(self.connect_timeout);

        let client =
            Client::with_options(options).map_err(|e| ConnectorError::connection(BACKEND, e))?;
        info!(
            database = %self.config.database,
            collection = %self.config.collection,
            "connected to mongodb"
        );
        Ok(client)
    }

    fn collection(&self, client: &Client) -> Collection<Document> {
        client
            .database(&self.config.database)
            .collection(&self.config.collection)
    }

    async fn find_rows(&self, coll: &Collection<Document>, limit: usize) -> Result<Vec<Record>> {
        // `limit(0)` means "no limit" to the server.
        if limit == 0 {
            return Ok(Vec::new());
        }
        debug!(collection = %self.config.collection, limit, "mongodb sample");
        let docs: Vec<Document> = with_timeout(BACKEND, self.query_timeout, async {
            coll.find(doc! {})
                .limit(limit_param(limit))
                .await
                .map_err(map_mongo_error)?
                .try_collect()
                .await
                .map_err(map_mongo_error)
        })
        .await?;
        Ok(docs.iter().map(document_to_record).collect())
    }

    async fn count_docs(&self, coll: &Collection<Document>) -> Result<u64> {
        debug!(collection = %self.config.collection, "mongodb count");
        with_timeout(BACKEND, self.query_timeout, async {
            coll.count_documents(doc! {}).await.map_err(map_mongo_error)
        })
        .await
    }

    async fn run_pipeline(
        &self,
        coll: &Collection<Document>,
        request: &AggregationRequest,
    ) -> Result<Vec<Bucket>> {
        let pipeline = build_aggregate_pipeline(request);
        debug!(collection = %self.config.collection, ?pipeline, "mongodb aggregate");
        let docs: Vec<Document> = with_timeout(BACKEND, self.query_timeout, async {
            coll.aggregate(pipeline)
                .await
                .map_err(map_mongo_error)?
                .try_collect()
                .await
                .map_err(map_mongo_error)
        })
        .await?;
        Ok(docs.iter().map(bucket_from_document).collect())
    }
}

#[async_trait]
impl TabularSource for MongoSource {
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
        if limit == 0 {
            return Ok(Vec::new());
        }
        let client = self.connect().await?;
        let result = self.find_rows(&self.collection(&client), limit).await;
        client.shutdown().await;
        result
    }

    async fn count(&self) -> Result<u64> {
        let client = self.connect().await?;
        let result = self.count_docs(&self.collection(&client)).await;
        client.shutdown().await;
        result
    }

    async fn aggregate(&self, request: &AggregationRequest) -> Result<Vec<Bucket>> {
        let client = self.connect().await?;
        let result = self.run_pipeline(&self.collection(&client), request).await;
        client.shutdown().await;
        result
    }

    async fn sample_and_count(&self, limit: usize) -> Result<(Vec<Record>, u64)> {
        let client = self.connect().await?;
        let coll = self.collection(&client);
        let result = match self.find_rows(&coll, limit).await {
            Ok(rows) => self.count_docs(&coll).await.map(|c| (rows, c)),
            Err(e) => Err(e),
        };
        drop(coll);
        client.shutdown().await;
        result
    }
}

/// Server-selection and authentication failures are connection failures;
/// everything else is a query failure.
fn map_mongo_error(e: mongodb::error::Error) -> ConnectorError {
    match *e.kind {
        ErrorKind::ServerSelection { .. } | ErrorKind::Authentication { .. } => {
            ConnectorError::connection(BACKEND, e)
        }
        _ => ConnectorError::query(BACKEND, e),
    }
}

// ── Document conversion ────────────────────────────────────────────

fn document_to_record(doc: &Document) -> Record {
    doc.iter()
        .map(|(k, v)| (k.clone(), bson_to_scalar(v)))
        .collect()
}

/// Converts a BSON value to a [`Scalar`].
///
/// Object ids become their hex string, dates become RFC 3339 dates, and
/// nested documents and arrays become relaxed extended JSON text.
pub(crate) fn bson_to_scalar(value: &Bson) -> Scalar {
    match value {
        Bson::Null | Bson::Undefined => Scalar::Null,
        Bson::Boolean(b) => Scalar::Bool(*b),
        Bson::Int32(i) => Scalar::Integer(i64::from(*i)),
        Bson::Int64(i) => Scalar::Integer(*i),
        Bson::Double(d) => Scalar::Float(*d),
        Bson::String(s) => Scalar::Text(s.clone()),
        Bson::ObjectId(oid) => Scalar::Text(oid.to_hex()),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map_or_else(|_| Scalar::Integer(dt.timestamp_millis()), Scalar::Date),
        Bson::Decimal128(_) => match value.clone().into_relaxed_extjson() {
            serde_json::Value::Object(map) => map
                .get("$numberDecimal")
                .and_then(serde_json::Value::as_str)
                .map_or(Scalar::Null, Scalar::from),
            other => Scalar::Text(other.to_string()),
        },
        Bson::Document(_) | Bson::Array(_) => {
            Scalar::Text(value.clone().into_relaxed_extjson().to_string())
        }
        other => Scalar::Text(other.to_string()),
    }
}
