//! Connector configuration.
//!
//! - [`ConnectorConfig`]: flat string property map for a live source
//! - [`ConfigKeySpec`]: description of one recognised property key
//! - [`SamplerConfig`]: sampling bounds and timeouts shared by every source

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, Result};
use crate::schema::SchemaStrategy;

// ---------------------------------------------------------------------------
// Serde helper: Duration as milliseconds
// ---------------------------------------------------------------------------

/// Serde helper that encodes a [`Duration`] as a `u64` millisecond count.
mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// ---------------------------------------------------------------------------
// Property map
// ---------------------------------------------------------------------------

/// Flat key/value configuration for a connector.
///
/// Keys are case-sensitive; values are kept as strings and parsed on access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectorConfig {
    connector_type: String,
    properties: HashMap<String, String>,
}

impl ConnectorConfig {
    /// Creates an empty config for the given connector type.
    #[must_use]
    pub fn new(connector_type: impl Into<String>) -> Self {
        Self {
            connector_type: connector_type.into(),
            properties: HashMap::new(),
        }
    }

    /// Creates a config with an initial property map.
    #[must_use]
    pub fn with_properties(
        connector_type: impl Into<String>,
        properties: HashMap<String, String>,
    ) -> Self {
        Self {
            connector_type: connector_type.into(),
            properties,
        }
    }

    /// Sets a property, returning `self` for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns the connector type (`"postgresql"`, `"mysql"`, ...).
    #[must_use]
    pub fn connector_type(&self) -> &str {
        &self.connector_type
    }

    /// Returns all properties.
    #[must_use]
    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Returns a property value. Empty strings are treated as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Returns a required property.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::MissingConfig`] if the key is absent or empty.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            ConnectorError::MissingConfig(format!("{} requires '{key}'", self.connector_type))
        })
    }

    /// Parses an optional property.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::ConfigurationError`] if the value is present
    /// but does not parse as `T`.
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                ConnectorError::ConfigurationError(format!("invalid value for '{key}': {e}"))
            }),
        }
    }
}

/// Describes one configuration key a connector recognises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigKeySpec {
    /// Property key.
    pub key: String,
    /// Human-readable description.
    pub description: String,
    /// Whether the key must be present.
    pub required: bool,
    /// Default value for optional keys.
    pub default: Option<String>,
}

impl ConfigKeySpec {
    /// A required key with no default.
    #[must_use]
    pub fn required(key: &str, description: &str) -> Self {
        Self {
            key: key.to_string(),
            description: description.to_string(),
            required: true,
            default: None,
        }
    }

    /// An optional key with a default value.
    #[must_use]
    pub fn optional(key: &str, description: &str, default: &str) -> Self {
        Self {
            key: key.to_string(),
            description: description.to_string(),
            required: false,
            default: Some(default.to_string()),
        }
    }
}

/// Checks that every required key in `specs` is present in `config`.
///
/// # Errors
///
/// Returns [`ConnectorError::MissingConfig`] naming every missing key.
pub fn validate_required(config: &ConnectorConfig, specs: &[ConfigKeySpec]) -> Result<()> {
    let missing: Vec<&str> = specs
        .iter()
        .filter(|s| s.required && config.get(&s.key).is_none())
        .map(|s| s.key.as_str())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConnectorError::MissingConfig(format!(
            "{} requires {}",
            config.connector_type(),
            missing.join(", ")
        )))
    }
}

// ---------------------------------------------------------------------------
// Sampler config
// ---------------------------------------------------------------------------

const fn default_schema_sample_rows() -> usize {
    20
}

const fn default_preview_rows() -> usize {
    5
}

const fn default_connect_sample_rows() -> usize {
    10
}

const fn default_fetch_limit() -> usize {
    100
}

const fn default_summary_sample_rows() -> usize {
    50
}

const fn default_query_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Bounds and timeouts applied when sampling a source.
///
/// All fields have defaults, so an empty JSON object deserializes to
/// [`SamplerConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplerConfig {
    /// Rows handed to schema inference. Default: 20.
    #[serde(default = "default_schema_sample_rows")]
    pub schema_sample_rows: usize,

    /// Rows echoed back to the caller after ingestion. Default: 5.
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,

    /// Rows sampled from a live database when it is first connected. Default: 10.
    #[serde(default = "default_connect_sample_rows")]
    pub connect_sample_rows: usize,

    /// Row limit for "get data" when the caller gives none. Default: 100.
    #[serde(default = "default_fetch_limit")]
    pub default_fetch_limit: usize,

    /// Rows given to the summarizer. Default: 50.
    #[serde(default = "default_summary_sample_rows")]
    pub summary_sample_rows: usize,

    /// Upper bound on any single database round-trip. Default: 30 s.
    #[serde(default = "default_query_timeout", with = "duration_millis")]
    pub query_timeout: Duration,

    /// Upper bound on establishing a database connection. Default: 10 s.
    #[serde(default = "default_connect_timeout", with = "duration_millis")]
    pub connect_timeout: Duration,

    /// How the schema field list is derived from the sample.
    #[serde(default)]
    pub schema_strategy: SchemaStrategy,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            schema_sample_rows: default_schema_sample_rows(),
            preview_rows: default_preview_rows(),
            connect_sample_rows: default_connect_sample_rows(),
            default_fetch_limit: default_fetch_limit(),
            summary_sample_rows: default_summary_sample_rows(),
            query_timeout: default_query_timeout(),
            connect_timeout: default_connect_timeout(),
            schema_strategy: SchemaStrategy::default(),
        }
    }
}
