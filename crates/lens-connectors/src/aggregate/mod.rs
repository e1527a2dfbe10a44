//! Group-and-reduce over records.
//!
//! Two ordering modes are kept deliberately separate:
//!
//! - [`AggregationMode::Ranked`]: buckets sorted by value descending and
//!   capped at [`RANKED_LIMIT`]. This is what live-database pushdown
//!   produces and what the generic table aggregation returns.
//! - [`AggregationMode::InsertionOrder`]: buckets in first-seen order of the
//!   group key, never value-sorted. Chronological axes depend on this.
//!
//! Per group, count and numeric sum are accumulated independently so a
//! chart can switch between count and sum without re-scanning.

pub mod sql;

#[cfg(feature = "mongodb")]
pub mod pipeline;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::schema::{Record, Scalar};

/// Maximum number of buckets returned in ranked mode.
pub const RANKED_LIMIT: usize = 50;

/// Label used for records whose group key is missing or null.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Chart type requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChartKind {
    /// Bar chart.
    #[default]
    Bar,
    /// Line chart.
    Line,
    /// Pie chart. Always aggregates by count.
    Pie,
    /// Scatter plot.
    Scatter,
    /// Area chart.
    Area,
}

str_enum!(ChartKind, lowercase, ConfigurationError, "Invalid chartType",
    Bar => "bar";
    Line => "line";
    Pie => "pie";
    Scatter => "scatter";
    Area => "area"
);

/// The reduction applied to each group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduction {
    /// Number of records in the group.
    Count,
    /// Sum of the named field's numeric values, non-numeric values skipped.
    Sum(String),
}

/// What to group on and how to reduce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationRequest {
    /// Field whose stringified value forms the bucket label.
    pub group_field: String,
    /// Field summed per group. Ignored for pie charts.
    #[serde(default)]
    pub value_field: Option<String>,
    /// Chart type; selects the reduction.
    #[serde(default)]
    pub chart_type: ChartKind,
}

impl AggregationRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(
        group_field: impl Into<String>,
        value_field: Option<String>,
        chart_type: ChartKind,
    ) -> Self {
        Self {
            group_field: group_field.into(),
            value_field: value_field.filter(|v| !v.is_empty()),
            chart_type,
        }
    }

    /// Pie charts count; otherwise a value field means sum, and no value
    /// field means count.
    #[must_use]
    pub fn reduction(&self) -> Reduction {
        match (&self.chart_type, &self.value_field) {
            (ChartKind::Pie, _) | (_, None) => Reduction::Count,
            (_, Some(field)) => Reduction::Sum(field.clone()),
        }
    }
}

/// One aggregated group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Stringified group key.
    pub label: String,
    /// Reduced value. Always finite.
    pub value: f64,
}

impl Bucket {
    /// Creates a bucket, replacing a non-finite value with 0.
    #[must_use]
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value: if value.is_finite() { value } else { 0.0 },
        }
    }
}

/// Bucket ordering policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMode {
    /// Value-descending, truncated to [`RANKED_LIMIT`].
    Ranked,
    /// First-seen order of the group key, no truncation.
    InsertionOrder,
}

/// Running totals for one group.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GroupAccumulator {
    /// Records in the group.
    pub count: u64,
    /// Sum of finite numeric values seen for the value field.
    pub sum: f64,
    /// Records that contributed to `sum`.
    pub numeric_count: u64,
}

impl GroupAccumulator {
    #[allow(clippy::cast_precision_loss)]
    fn reduce(&self, reduction: &Reduction) -> f64 {
        match reduction {
            Reduction::Count => self.count as f64,
            Reduction::Sum(_) => self.sum,
        }
    }
}

/// Returns the group label for a record: the stringified key, or
/// [`UNKNOWN_LABEL`] when the key is missing or null.
#[must_use]
pub fn group_label(record: &Record, group_field: &str) -> String {
    record
        .get(group_field)
        .and_then(Scalar::to_label)
        .unwrap_or_else(|| UNKNOWN_LABEL.to_string())
}

/// Accumulates count and sum per group in first-seen order.
///
/// When `value_field` is `None` only counts are tracked.
#[must_use]
pub fn accumulate(
    records: &[Record],
    group_field: &str,
    value_field: Option<&str>,
) -> IndexMap<String, GroupAccumulator> {
    let mut groups: IndexMap<String, GroupAccumulator> = IndexMap::new();
    for record in records {
        let acc = groups.entry(group_label(record, group_field)).or_default();
        acc.count += 1;
        if let Some(v) = value_field
            .and_then(|f| record.get(f))
            .and_then(Scalar::as_f64_lenient)
        {
            acc.sum += v;
            acc.numeric_count += 1;
        }
    }
    groups
}

/// Groups and reduces `records` per `request`, ordered per `mode`.
///
/// In insertion-order sum mode, a group with no numeric value at all is
/// left out; ranked mode keeps it with a sum of 0.
#[must_use]
pub fn aggregate(
    records: &[Record],
    request: &AggregationRequest,
    mode: AggregationMode,
) -> Vec<Bucket> {
    let reduction = request.reduction();
    let value_field = match &reduction {
        Reduction::Count => None,
        Reduction::Sum(f) => Some(f.as_str()),
    };
    let groups = accumulate(records, &request.group_field, value_field);

    match mode {
        AggregationMode::InsertionOrder => groups
            .into_iter()
            .filter(|(_, acc)| matches!(reduction, Reduction::Count) || acc.numeric_count > 0)
            .map(|(label, acc)| Bucket::new(label, acc.reduce(&reduction)))
            .collect(),
        AggregationMode::Ranked => {
            let buckets = groups
                .into_iter()
                .map(|(label, acc)| Bucket::new(label, acc.reduce(&reduction)))
                .collect();
            rank(buckets, RANKED_LIMIT)
        }
    }
}

/// Ranked-mode aggregation: value-descending, top [`RANKED_LIMIT`].
#[must_use]
pub fn aggregate_ranked(records: &[Record], request: &AggregationRequest) -> Vec<Bucket> {
    aggregate(records, request, AggregationMode::Ranked)
}

/// Chart-builder aggregation: first-seen group order, no truncation.
#[must_use]
pub fn aggregate_ordered(records: &[Record], request: &AggregationRequest) -> Vec<Bucket> {
    aggregate(records, request, AggregationMode::InsertionOrder)
}

/// Sorts buckets by value descending (stable, so ties keep their order)
/// and keeps the first `limit`.
#[must_use]
pub fn rank(mut buckets: Vec<Bucket>, limit: usize) -> Vec<Bucket> {
    buckets.sort_by(|a, b| b.value.total_cmp(&a.value));
    buckets.truncate(limit);
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pairs: &[(&str, Scalar)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn labels(buckets: &[Bucket]) -> Vec<&str> {
        buckets.iter().map(|b| b.label.as_str()).collect()
    }

    #[test]
    fn test_chart_kind_parse() {
        assert_eq!("pie".parse::<ChartKind>().unwrap(), ChartKind::Pie);
        assert_eq!(" Bar ".parse::<ChartKind>().unwrap(), ChartKind::Bar);
        let err = "donut".parse::<ChartKind>().unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("Invalid chartType"));
    }

    #[test]
    fn test_reduction_selection() {
        let r = AggregationRequest::new("c", Some("v".into()), ChartKind::Pie);
        assert_eq!(r.reduction(), Reduction::Count);
        let r = AggregationRequest::new("c", Some("v".into()), ChartKind::Bar);
        assert_eq!(r.reduction(), Reduction::Sum("v".into()));
        let r = AggregationRequest::new("c", None, ChartKind::Line);
        assert_eq!(r.reduction(), Reduction::Count);
        let r = AggregationRequest::new("c", Some(String::new()), ChartKind::Line);
        assert_eq!(r.reduction(), Reduction::Count);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let records = vec![
            rec(&[("d", "2024-01-01".into()), ("v", Scalar::Integer(5))]),
            rec(&[("d", "2024-01-03".into()), ("v", Scalar::Integer(2))]),
            rec(&[("d", "2024-01-02".into()), ("v", Scalar::Integer(9))]),
        ];
        let req = AggregationRequest::new("d", Some("v".into()), ChartKind::Line);
        let buckets = aggregate_ordered(&records, &req);
        assert_eq!(labels(&buckets), vec!["2024-01-01", "2024-01-03", "2024-01-02"]);

        let ranked = aggregate_ranked(&records, &req);
        assert_eq!(labels(&ranked), vec!["2024-01-02", "2024-01-01", "2024-01-03"]);
    }

    #[test]
    fn test_non_numeric_excluded_from_sum() {
        let records = vec![
            rec(&[("cat", "A".into()), ("val", "10".into())]),
            rec(&[("cat", "A".into()), ("val", "oops".into())]),
            rec(&[("cat", "B".into()), ("val", "5".into())]),
        ];
        let req = AggregationRequest::new("cat", Some("val".into()), ChartKind::Bar);
        let buckets = aggregate_ranked(&records, &req);
        assert_eq!(buckets, vec![Bucket::new("A", 10.0), Bucket::new("B", 5.0)]);

        let groups = accumulate(&records, "cat", Some("val"));
        assert_eq!(groups["A"].count, 2);
        assert_eq!(groups["A"].numeric_count, 1);
    }

    #[test]
    fn test_missing_group_key_is_unknown() {
        let records = vec![
            rec(&[("cat", "A".into())]),
            rec(&[("cat", Scalar::Null)]),
            rec(&[("other", "x".into())]),
        ];
        let req = AggregationRequest::new("cat", None, ChartKind::Pie);
        let buckets = aggregate_ordered(&records, &req);
        assert_eq!(buckets, vec![Bucket::new("A", 1.0), Bucket::new("Unknown", 2.0)]);
    }

    #[test]
    fn test_count_conservation() {
        let records: Vec<Record> = (0..37)
            .map(|i| rec(&[("g", Scalar::Integer(i % 7)), ("v", "n/a".into())]))
            .collect();
        for chart in [ChartKind::Bar, ChartKind::Pie] {
            let req = AggregationRequest::new("g", None, chart);
            let total: f64 = aggregate_ranked(&records, &req).iter().map(|b| b.value).sum();
            assert!((total - 37.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_ranked_caps_at_fifty() {
        let records: Vec<Record> = (0..100)
            .map(|i| rec(&[("g", format!("g{i}").into()), ("v", Scalar::Integer(i))]))
            .collect();
        let req = AggregationRequest::new("g", Some("v".into()), ChartKind::Bar);
        let buckets = aggregate_ranked(&records, &req);
        assert_eq!(buckets.len(), RANKED_LIMIT);
        assert!(buckets.windows(2).all(|w| w[0].value >= w[1].value));
        assert_eq!(buckets[0].label, "g99");

        assert_eq!(aggregate_ordered(&records, &req).len(), 100);
    }

    #[test]
    fn test_all_non_numeric_group() {
        let records = vec![
            rec(&[("g", "A".into()), ("v", "x".into())]),
            rec(&[("g", "B".into()), ("v", Scalar::Integer(3))]),
        ];
        let req = AggregationRequest::new("g", Some("v".into()), ChartKind::Bar);
        assert_eq!(labels(&aggregate_ordered(&records, &req)), vec!["B"]);
        assert_eq!(
            aggregate_ranked(&records, &req),
            vec![Bucket::new("B", 3.0), Bucket::new("A", 0.0)]
        );
    }

    #[test]
    fn test_ranked_ties_keep_first_seen_order() {
        let buckets = vec![
            Bucket::new("a", 1.0),
            Bucket::new("b", 2.0),
            Bucket::new("c", 1.0),
        ];
        assert_eq!(labels(&rank(buckets, 10)), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_bucket_non_finite_is_zero() {
        assert_eq!(Bucket::new("x", f64::NAN).value, 0.0);
        assert_eq!(Bucket::new("x", f64::INFINITY).value, 0.0);
    }

    #[test]
    fn test_request_deserialize() {
        let req: AggregationRequest =
            serde_json::from_str(r#"{"groupField":"city","chartType":"pie"}"#).unwrap();
        assert_eq!(req.group_field, "city");
        assert_eq!(req.value_field, None);
        assert_eq!(req.chart_type, ChartKind::Pie);
    }
}
