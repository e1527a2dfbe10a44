//! Natural-language summarizer seam.
//!
//! The crate does not talk to any language model. It prepares a
//! [`DatasetContext`] and hands it to whatever [`DatasetSummarizer`] the
//! host wires in.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::config::SamplerConfig;
use crate::dataset::{fetch_data, DatasetDescriptor};
use crate::error::Result;
use crate::schema::{infer_schema_with, Record, Schema};

/// What a summarizer sees about a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetContext {
    /// Dataset name.
    pub name: String,
    /// Persisted schema, or one inferred from `sample` when none was stored.
    pub schema: Schema,
    /// Persisted row count, or the sample size when none was stored.
    pub records_count: u64,
    /// Leading rows of the dataset.
    pub sample: Vec<Record>,
}

/// Produces prose about a dataset.
///
/// Implemented outside this crate, typically over a hosted language model.
#[async_trait]
pub trait DatasetSummarizer: Send + Sync {
    /// Error type of the implementation.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Summarizes the dataset in a few sentences.
    async fn summarize(&self, context: &DatasetContext) -> std::result::Result<String, Self::Error>;

    /// Answers a free-form question about the dataset.
    async fn answer(
        &self,
        context: &DatasetContext,
        question: &str,
    ) -> std::result::Result<String, Self::Error>;
}

/// Fetches `summary_sample_rows` rows and assembles the summarizer input.
///
/// # Errors
///
/// Returns the source's error; see [`fetch_data`].
pub async fn build_context(
    descriptor: &DatasetDescriptor,
    sampler: &SamplerConfig,
) -> Result<DatasetContext> {
    let sample = fetch_data(descriptor, Some(sampler.summary_sample_rows), sampler).await?;
    let schema = match &descriptor.schema {
        Some(schema) => schema.clone(),
        None => {
            let rows = &sample[..sample.len().min(sampler.schema_sample_rows)];
            infer_schema_with(rows, sampler.schema_strategy)
        }
    };
    let records_count = descriptor
        .records_count
        .unwrap_or(sample.len() as u64);

    debug!(
        dataset = %descriptor.name,
        fields = schema.len(),
        sample_rows = sample.len(),
        "built summarizer context"
    );
    Ok(DatasetContext {
        name: descriptor.name.clone(),
        schema,
        records_count,
        sample,
    })
}
