//! Chart-shape post-processing.
//!
//! Everything here is a pure transform over an ordered bucket list:
//! category limiting, pie folding, label normalization, and numeric axis
//! formatting. None of it changes the underlying bucket values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::aggregate::{aggregate_ordered, AggregationRequest, Bucket, ChartKind};
use crate::error::ConnectorError;
use crate::schema::Record;

/// Pie charts with more buckets than this are folded.
pub const PIE_FOLD_THRESHOLD: usize = 12;

/// Number of slices kept before the remainder is folded into `Others`.
pub const PIE_TOP_SLICES: usize = 10;

/// Label of the synthetic slice holding the folded remainder.
pub const OTHERS_LABEL: &str = "Others";

/// Dataset label used when a chart counts rows instead of summing a field.
pub const COUNT_SERIES_LABEL: &str = "Count";

// ── Category limit ─────────────────────────────────────────────────

/// How many categories the chart builder shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryLimit {
    /// No truncation.
    #[default]
    All,
    /// The first `n` categories by position.
    First(usize),
}

impl CategoryLimit {
    /// Parses `"all"` or a positive integer.
    ///
    /// Like `parseInt`, a leading run of digits is enough (`"20 rows"` is
    /// 20). Anything that does not yield a positive integer means
    /// [`CategoryLimit::All`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Self::All;
        }
        let digits_end = s
            .char_indices()
            .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '+')))
            .map_or(s.len(), |(i, _)| i);
        match s[..digits_end].trim_start_matches('+').parse::<usize>() {
            Ok(n) if n > 0 => Self::First(n),
            _ => Self::All,
        }
    }

    /// Truncates `buckets` by position.
    #[must_use]
    pub fn apply(self, mut buckets: Vec<Bucket>) -> Vec<Bucket> {
        if let Self::First(n) = self {
            buckets.truncate(n);
        }
        buckets
    }
}

impl FromStr for CategoryLimit {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for CategoryLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::First(n) => write!(f, "{n}"),
        }
    }
}

impl Serialize for CategoryLimit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_str("all"),
            Self::First(n) => serializer.serialize_u64(u64::try_from(*n).unwrap_or(u64::MAX)),
        }
    }
}

impl<'de> Deserialize<'de> for CategoryLimit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self::parse(&s),
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Raw::Number(n) if n.is_finite() && n >= 1.0 => Self::First(n.trunc() as usize),
            Raw::Number(_) => Self::All,
        })
    }
}

/// Truncates an ordered bucket list to the first `limit` entries.
#[must_use]
pub fn apply_category_limit(buckets: Vec<Bucket>, limit: CategoryLimit) -> Vec<Bucket> {
    limit.apply(buckets)
}

// ── Chart builder ──────────────────────────────────────────────────

/// Output of the interactive chart builder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    /// Buckets in first-seen order, after the category limit.
    pub buckets: Vec<Bucket>,
    /// Largest bucket value, or 1 when there is none (or it is 0).
    pub max_value: f64,
    /// Sum of bucket values, or 1 when that is 0.
    pub total_value: f64,
}

/// Builds chart data over an already-fetched batch.
///
/// Groups on `x_field` in first-seen order, never value-sorted. With a
/// `y_field` each group is the sum of its finite numeric values (groups
/// without any are left out); without one, the row count. The result is
/// then cut to `limit` by position.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn build_chart_data(
    records: &[Record],
    x_field: &str,
    y_field: Option<&str>,
    limit: CategoryLimit,
) -> ChartData {
    if x_field.is_empty() {
        return ChartData {
            buckets: Vec::new(),
            max_value: 1.0,
            total_value: 0.0,
        };
    }
    let request = AggregationRequest::new(x_field, y_field.map(str::to_string), ChartKind::Bar);
    let buckets = limit.apply(aggregate_ordered(records, &request));

    let max = buckets.iter().map(|b| b.value).fold(0.0_f64, f64::max);
    let total: f64 = buckets.iter().map(|b| b.value).sum();
    ChartData {
        buckets,
        max_value: if max == 0.0 { 1.0 } else { max },
        total_value: if total == 0.0 { 1.0 } else { total },
    }
}

// ── Pie folding ────────────────────────────────────────────────────

/// Folds a bucket list for pie display.
///
/// Up to [`PIE_FOLD_THRESHOLD`] buckets are returned as-is. Beyond that, a
/// value-descending copy keeps the top [`PIE_TOP_SLICES`] and appends one
/// [`OTHERS_LABEL`] slice holding the sum of the rest. The input is not
/// reordered.
#[must_use]
pub fn pie_slices(buckets: &[Bucket]) -> Vec<Bucket> {
    if buckets.len() <= PIE_FOLD_THRESHOLD {
        return buckets.to_vec();
    }
    let mut sorted = buckets.to_vec();
    sorted.sort_by(|a, b| b.value.total_cmp(&a.value));
    let rest: f64 = sorted[PIE_TOP_SLICES..].iter().map(|b| b.value).sum();
    sorted.truncate(PIE_TOP_SLICES);
    sorted.push(Bucket::new(OTHERS_LABEL, rest));
    sorted
}

// ── Display formatting ─────────────────────────────────────────────

/// Returns `true` if `s` starts with `dddd-dd-dd`.
fn has_iso_date_prefix(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 10
        && b[..10].iter().enumerate().all(|(i, c)| match i {
            4 | 7 => *c == b'-',
            _ => c.is_ascii_digit(),
        })
}

/// Shortens ISO date-like labels to `YYYY-MM-DD`; other labels pass through.
#[must_use]
pub fn normalize_label(label: &str) -> String {
    if has_iso_date_prefix(label) {
        label[..10].to_string()
    } else {
        label.to_string()
    }
}

/// Formats a value for a numeric axis.
///
/// `>= 1e9` becomes `x.xB`, `>= 1e6` `x.xM`, `>= 1e3` `x.xK`. Smaller
/// values use comma grouping and at most three decimals.
#[must_use]
pub fn format_axis_value(value: f64) -> String {
    if value >= 1e9 {
        format!("{:.1}B", value / 1e9)
    } else if value >= 1e6 {
        format!("{:.1}M", value / 1e6)
    } else if value >= 1e3 {
        format!("{:.1}K", value / 1e3)
    } else {
        format_grouped(value)
    }
}

/// `1234567.5` → `1,234,567.5`; up to three fraction digits, trailing
/// zeros dropped.
fn format_grouped(value: f64) -> String {
    if !value.is_finite() {
        return if value.is_nan() {
            "NaN".to_string()
        } else if value > 0.0 {
            "∞".to_string()
        } else {
            "-∞".to_string()
        };
    }
    let fixed = format!("{:.3}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let negative = value < 0.0 && (int_part != "0" || !frac.is_empty());
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out
}

// ── Chart response ─────────────────────────────────────────────────

/// One data series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    /// Series name: the summed field, or `Count`.
    pub label: String,
    /// One value per label.
    pub data: Vec<f64>,
}

/// Chart payload returned to the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartResponse {
    /// Requested chart type.
    pub chart_type: ChartKind,
    /// X-axis field.
    pub x_field: String,
    /// Summed field, or `count`.
    pub y_field: String,
    /// Field the buckets are grouped on.
    pub group_by: String,
    /// Bucket labels, in bucket order.
    pub labels: Vec<String>,
    /// A single series.
    pub datasets: Vec<ChartSeries>,
    /// The buckets themselves.
    pub raw_data: Vec<Bucket>,
}

impl ChartResponse {
    /// Shapes `buckets` into a response.
    #[must_use]
    pub fn new(
        chart_type: ChartKind,
        x_field: &str,
        y_field: Option<&str>,
        group_by: &str,
        buckets: Vec<Bucket>,
    ) -> Self {
        let y = y_field.filter(|y| !y.is_empty());
        Self {
            chart_type,
            x_field: x_field.to_string(),
            y_field: y.unwrap_or("count").to_string(),
            group_by: group_by.to_string(),
            labels: buckets.iter().map(|b| b.label.clone()).collect(),
            datasets: vec![ChartSeries {
                label: y.unwrap_or(COUNT_SERIES_LABEL).to_string(),
                data: buckets.iter().map(|b| b.value).collect(),
            }],
            raw_data: buckets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Scalar;

    fn bucket(label: &str, value: f64) -> Bucket {
        Bucket::new(label, value)
    }

    fn rec(d: &str, v: Scalar) -> Record {
        let mut r = Record::new();
        r.insert("d".into(), Scalar::from(d));
        r.insert("v".into(), v);
        r
    }

    #[test]
    fn test_category_limit_parse() {
        assert_eq!(CategoryLimit::parse("all"), CategoryLimit::All);
        assert_eq!(CategoryLimit::parse("ALL"), CategoryLimit::All);
        assert_eq!(CategoryLimit::parse("20"), CategoryLimit::First(20));
        assert_eq!(CategoryLimit::parse("5 rows"), CategoryLimit::First(5));
        assert_eq!(CategoryLimit::parse("0"), CategoryLimit::All);
        assert_eq!(CategoryLimit::parse("-3"), CategoryLimit::All);
        assert_eq!(CategoryLimit::parse("lots"), CategoryLimit::All);
        assert_eq!("7".parse::<CategoryLimit>().unwrap(), CategoryLimit::First(7));
    }

    #[test]
    fn test_category_limit_serde() {
        let l: CategoryLimit = serde_json::from_str("10").unwrap();
        assert_eq!(l, CategoryLimit::First(10));
        let l: CategoryLimit = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(l, CategoryLimit::All);
        let l: CategoryLimit = serde_json::from_str("\"15\"").unwrap();
        assert_eq!(l, CategoryLimit::First(15));
        assert_eq!(serde_json::to_string(&CategoryLimit::First(3)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&CategoryLimit::All).unwrap(), "\"all\"");
    }

    #[test]
    fn test_apply_category_limit_by_position() {
        let buckets = vec![bucket("c", 1.0), bucket("a", 9.0), bucket("b", 5.0)];
        let cut = apply_category_limit(buckets.clone(), CategoryLimit::First(2));
        assert_eq!(cut, vec![bucket("c", 1.0), bucket("a", 9.0)]);
        assert_eq!(apply_category_limit(buckets.clone(), CategoryLimit::All), buckets);
        assert_eq!(
            apply_category_limit(buckets.clone(), CategoryLimit::First(10)),
            buckets
        );
    }

    #[test]
    fn test_build_chart_data_insertion_order() {
        let records = vec![
            rec("2024-01-01", Scalar::Integer(5)),
            rec("2024-01-03", Scalar::Integer(2)),
            rec("2024-01-02", Scalar::Integer(9)),
            rec("2024-01-01", Scalar::from("1.5")),
        ];
        let data = build_chart_data(&records, "d", Some("v"), CategoryLimit::All);
        let labels: Vec<&str> = data.buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["2024-01-01", "2024-01-03", "2024-01-02"]);
        assert_eq!(data.buckets[0].value, 6.5);
        assert_eq!(data.max_value, 9.0);
        assert_eq!(data.total_value, 17.5);
    }

    #[test]
    fn test_build_chart_data_limit_and_count() {
        let records = vec![
            rec("x", Scalar::Null),
            rec("y", Scalar::Null),
            rec("x", Scalar::Null),
            rec("z", Scalar::Null),
        ];
        let data = build_chart_data(&records, "d", None, CategoryLimit::First(2));
        assert_eq!(data.buckets, vec![bucket("x", 2.0), bucket("y", 1.0)]);
    }

    #[test]
    fn test_build_chart_data_skips_non_numeric() {
        let records = vec![
            rec("a", Scalar::from("oops")),
            rec("b", Scalar::Integer(4)),
        ];
        let data = build_chart_data(&records, "d", Some("v"), CategoryLimit::All);
        assert_eq!(data.buckets, vec![bucket("b", 4.0)]);
    }

    #[test]
    fn test_build_chart_data_empty() {
        let data = build_chart_data(&[], "d", Some("v"), CategoryLimit::All);
        assert!(data.buckets.is_empty());
        assert_eq!(data.max_value, 1.0);
        assert_eq!(data.total_value, 1.0);
    }

    #[test]
    fn test_pie_folding_fifteen_buckets() {
        let values = [
            100.0, 90.0, 80.0, 70.0, 60.0, 50.0, 40.0, 30.0, 20.0, 10.0, 5.0, 3.0, 1.0, 2.0, 4.0,
        ];
        let buckets: Vec<Bucket> = values
            .iter()
            .enumerate()
            .map(|(i, v)| bucket(&format!("c{i}"), *v))
            .collect();
        let pie = pie_slices(&buckets);
        assert_eq!(pie.len(), 11);
        assert_eq!(pie[0].value, 100.0);
        assert_eq!(pie[9].value, 10.0);
        assert_eq!(pie[10], bucket(OTHERS_LABEL, 15.0));
        // input untouched
        assert_eq!(buckets[13].value, 2.0);
    }

    #[test]
    fn test_pie_small_passthrough() {
        let buckets: Vec<Bucket> = (0..12).map(|i| bucket(&i.to_string(), f64::from(i))).collect();
        assert_eq!(pie_slices(&buckets), buckets);
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("2024-01-15T10:30:00Z"), "2024-01-15");
        assert_eq!(normalize_label("2024-01-15"), "2024-01-15");
        assert_eq!(normalize_label("15-01-2024"), "15-01-2024");
        assert_eq!(normalize_label("North"), "North");
        assert_eq!(normalize_label(""), "");
    }

    #[test]
    fn test_format_axis_value() {
        assert_eq!(format_axis_value(2_500_000_000.0), "2.5B");
        assert_eq!(format_axis_value(1_000_000.0), "1.0M");
        assert_eq!(format_axis_value(12_340.0), "12.3K");
        assert_eq!(format_axis_value(999.0), "999");
        assert_eq!(format_axis_value(12.5), "12.5");
        assert_eq!(format_axis_value(0.1234), "0.123");
        assert_eq!(format_axis_value(0.0), "0");
        assert_eq!(format_axis_value(-1_234_567.0), "-1,234,567");
    }

    #[test]
    fn test_chart_response_shape() {
        let resp = ChartResponse::new(
            ChartKind::Bar,
            "region",
            None,
            "region",
            vec![bucket("N", 3.0), bucket("S", 1.0)],
        );
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["chartType"], "bar");
        assert_eq!(json["yField"], "count");
        assert_eq!(json["groupBy"], "region");
        assert_eq!(json["labels"], serde_json::json!(["N", "S"]));
        assert_eq!(json["datasets"][0]["label"], "Count");
        assert_eq!(json["datasets"][0]["data"], serde_json::json!([3.0, 1.0]));
        assert_eq!(json["rawData"][1]["label"], "S");
    }
}
