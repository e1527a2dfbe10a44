//! Connector error types.
//!
//! Every fallible operation in this crate returns [`ConnectorError`]. The
//! variants follow the failure taxonomy callers act on: malformed file
//! content, unreachable or failing databases, unsupported source kinds, and
//! invalid descriptors or chart requests.

use std::time::Duration;

use thiserror::Error;

/// Result alias for connector operations.
pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Errors that can occur while sampling, counting, or aggregating a source.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// File content is malformed for its detected format.
    #[error("{format} parse error: {message}")]
    Parse {
        /// Format that was being parsed (`"csv"`, `"json"`, `"xlsx"`).
        format: &'static str,
        /// Parser message.
        message: String,
    },

    /// Could not connect to a live database (unreachable, bad credentials).
    #[error("{backend} connection failed: {message}")]
    ConnectionFailed {
        /// Backend name (`"postgresql"`, `"mysql"`, `"mongodb"`).
        backend: &'static str,
        /// The backend driver's own error text.
        message: String,
    },

    /// A query failed after the connection was established.
    #[error("{backend} query failed: {message}")]
    Query {
        /// Backend name.
        backend: &'static str,
        /// The backend driver's own error text.
        message: String,
    },

    /// The round-trip did not complete within the configured timeout.
    #[error("{backend} query timed out after {after:?}")]
    Timeout {
        /// Backend name.
        backend: &'static str,
        /// Timeout that elapsed.
        after: Duration,
    },

    /// The source kind or file extension is not one this crate reads.
    #[error("unsupported source type: {0}")]
    UnsupportedSource(String),

    /// A required descriptor or request key is missing.
    #[error("missing config: {0}")]
    MissingConfig(String),

    /// A descriptor or request value is invalid.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// Local I/O failure (reading an uploaded file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectorError {
    /// Builds a [`ConnectorError::Parse`].
    pub fn parse(format: &'static str, message: impl ToString) -> Self {
        Self::Parse {
            format,
            message: message.to_string(),
        }
    }

    /// Builds a [`ConnectorError::ConnectionFailed`].
    pub fn connection(backend: &'static str, message: impl ToString) -> Self {
        Self::ConnectionFailed {
            backend,
            message: message.to_string(),
        }
    }

    /// Builds a [`ConnectorError::Query`].
    pub fn query(backend: &'static str, message: impl ToString) -> Self {
        Self::Query {
            backend,
            message: message.to_string(),
        }
    }

    /// Returns `true` when the caller supplied something invalid, as opposed
    /// to the data source failing.
    ///
    /// The HTTP layer maps these to a 400 response and everything else to a
    /// "could not read data source" failure.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedSource(_) | Self::MissingConfig(_) | Self::ConfigurationError(_)
        )
    }
}
