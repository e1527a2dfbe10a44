//! `MongoDB` aggregation pipeline for ranked pushdown.

use mongodb::bson::{doc, Bson, Document};

use super::{AggregationRequest, Bucket, Reduction, RANKED_LIMIT, UNKNOWN_LABEL};
use crate::source::mongo::bson_to_scalar;

/// Builds `$group → $sort → $limit → $project`, yielding documents shaped
/// `{label, value}` in value-descending order.
///
/// Summed fields go through `$convert` to double first, so numeric strings
/// count and Decimal128 columns come back as plain doubles. Values that do
/// not convert are skipped.
#[must_use]
pub fn build_aggregate_pipeline(request: &AggregationRequest) -> Vec<Document> {
    let sum = match request.reduction() {
        Reduction::Count => Bson::Int32(1),
        Reduction::Sum(field) => Bson::Document(doc! {
            "$convert": {
                "input": format!("${field}"),
                "to": "double",
                "onError": Bson::Null,
                "onNull": Bson::Null,
            }
        }),
    };
    let limit = i64::try_from(RANKED_LIMIT).unwrap_or(i64::MAX);

    vec![
        doc! { "$group": { "_id": format!("${}", request.group_field), "value": { "$sum": sum } } },
        doc! { "$sort": { "value": -1 } },
        doc! { "$limit": limit },
        doc! { "$project": { "_id": 0, "label": "$_id", "value": 1 } },
    ]
}

/// Converts one pipeline output document into a [`Bucket`].
///
/// A missing or null label becomes `"Unknown"`. The value is read like any
/// other cell (Decimal128 included); one that is not numeric becomes 0.
#[must_use]
pub fn bucket_from_document(doc: &Document) -> Bucket {
    let label = doc
        .get("label")
        .map(bson_to_scalar)
        .and_then(|s| s.to_label())
        .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
    let value = doc
        .get("value")
        .map(bson_to_scalar)
        .and_then(|s| s.as_f64_lenient())
        .unwrap_or(0.0);
    Bucket::new(label, value)
}
