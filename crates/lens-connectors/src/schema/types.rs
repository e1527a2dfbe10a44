//! Schema types used across the connector framework.
//!
//! - [`Scalar`]: one cell value from any source
//! - [`Record`]: one row, an insertion-ordered field → value map
//! - [`TypeTag`]: the semantic type inferred for a field
//! - [`FieldDescriptor`] / [`Schema`]: inferred per-field metadata

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One row from any source, keyed by field name in source order.
pub type Record = IndexMap<String, Scalar>;

/// An ordered list of field descriptors, one per distinct sampled key.
pub type Schema = Vec<FieldDescriptor>;

/// A single cell value.
///
/// Sources map their native types onto this small set. Values serialize
/// untagged, so `Integer(30)` is the JSON number `30` and `Text("a")` is
/// the JSON string `"a"`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Scalar {
    /// Missing or SQL/JSON null.
    #[default]
    Null,
    /// Native boolean.
    Bool(bool),
    /// Integral number.
    Integer(i64),
    /// Non-integral (or out-of-range integral) number.
    Float(f64),
    /// A native date or timestamp from the source, rendered as ISO 8601.
    Date(String),
    /// Free text. Numbers and dates in text form stay here until inference.
    Text(String),
}

impl Scalar {
    /// Returns `true` for values the sampler treats as absent: null and
    /// the empty string.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Returns the text payload of `Text` and `Date` values.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Date(s) => Some(s),
            _ => None,
        }
    }

    /// Lenient numeric reading used by aggregation.
    ///
    /// Numbers pass through; text yields its longest leading decimal prefix
    /// (`"12.5kg"` → 12.5, `"2024-01-15"` → 2024). Booleans, null and text
    /// without a numeric prefix yield `None`, as do non-finite results.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64_lenient(&self) -> Option<f64> {
        let v = match self {
            Self::Integer(i) => *i as f64,
            Self::Float(f) => *f,
            Self::Text(s) | Self::Date(s) => parse_float_prefix(s)?,
            Self::Null | Self::Bool(_) => return None,
        };
        v.is_finite().then_some(v)
    }

    /// Renders the value as a group label. Null renders as `None`.
    #[must_use]
    pub fn to_label(&self) -> Option<String> {
        match self {
            Self::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Date(s) | Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Scalar {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Self::Text(s),
            // Nested values are kept as their JSON text.
            nested @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Self::Text(nested.to_string())
            }
        }
    }
}

impl From<&Scalar> for serde_json::Value {
    fn from(value: &Scalar) -> Self {
        match value {
            Scalar::Null => serde_json::Value::Null,
            Scalar::Bool(b) => serde_json::Value::Bool(*b),
            Scalar::Integer(i) => serde_json::Value::from(*i),
            Scalar::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Scalar::Date(s) | Scalar::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Self::Float(_) => serializer.serialize_none(),
            Self::Date(s) | Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Scalar::from)
    }
}

/// Converts a JSON object into a [`Record`]. Non-objects yield `None`.
#[must_use]
pub fn record_from_json(value: serde_json::Value) -> Option<Record> {
    match value {
        serde_json::Value::Object(map) => Some(
            map.into_iter()
                .map(|(k, v)| (k, Scalar::from(v)))
                .collect(),
        ),
        _ => None,
    }
}

/// Parses the longest leading decimal number in `s`, after leading
/// whitespace. Accepts an optional sign, digits with an optional fraction,
/// and an exponent only when it is followed by digits.
pub(crate) fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        return s[..end + "Infinity".len()].parse::<f64>().ok();
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

/// Semantic type inferred for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTag {
    /// Whole numbers.
    Integer,
    /// Numbers with a fractional part.
    Float,
    /// `true` / `false`.
    Boolean,
    /// Values with a valid `YYYY-MM-DD` prefix.
    Date,
    /// Anything else; also the fallback for empty or unknown input.
    String,
}

impl TypeTag {
    /// Tally order; ties in a majority vote resolve to the earliest tag.
    pub const ALL: [TypeTag; 5] = [
        TypeTag::Integer,
        TypeTag::Float,
        TypeTag::Boolean,
        TypeTag::Date,
        TypeTag::String,
    ];

    /// Position of this tag in [`TypeTag::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Integer => 0,
            Self::Float => 1,
            Self::Boolean => 2,
            Self::Date => 3,
            Self::String => 4,
        }
    }
}

str_enum!(TypeTag, lowercase, ConfigurationError, "unknown field type",
    Integer => "integer", "int";
    Float => "float", "double";
    Boolean => "boolean", "bool";
    Date => "date";
    String => "string", "text"
);

/// Inferred metadata for one field.
///
/// Created once per extraction call; a later extraction supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// Field name as it appears in the source.
    pub field: String,
    /// Majority-vote type over the sampled values.
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    /// First non-blank sampled value, or null.
    pub example_value: Scalar,
    /// Up to the first five non-blank sampled values.
    pub sample_values: Vec<Scalar>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values() {
        assert!(Scalar::Null.is_blank());
        assert!(Scalar::from("").is_blank());
        assert!(!Scalar::from(" ").is_blank());
        assert!(!Scalar::Integer(0).is_blank());
        assert!(!Scalar::Bool(false).is_blank());
    }

    #[test]
    fn test_lenient_float() {
        assert_eq!(Scalar::from("10").as_f64_lenient(), Some(10.0));
        assert_eq!(Scalar::from(" 12.5kg").as_f64_lenient(), Some(12.5));
        assert_eq!(Scalar::from(".5").as_f64_lenient(), Some(0.5));
        assert_eq!(Scalar::from("1e3x").as_f64_lenient(), Some(1000.0));
        assert_eq!(Scalar::from("3e").as_f64_lenient(), Some(3.0));
        assert_eq!(Scalar::from("2024-01-15").as_f64_lenient(), Some(2024.0));
        assert_eq!(Scalar::from("oops").as_f64_lenient(), None);
        assert_eq!(Scalar::from("-").as_f64_lenient(), None);
        assert_eq!(Scalar::from(".").as_f64_lenient(), None);
        assert_eq!(Scalar::from("Infinity").as_f64_lenient(), None);
        assert_eq!(Scalar::Bool(true).as_f64_lenient(), None);
        assert_eq!(Scalar::Null.as_f64_lenient(), None);
        assert_eq!(Scalar::Float(f64::NAN).as_f64_lenient(), None);
        assert_eq!(Scalar::Integer(7).as_f64_lenient(), Some(7.0));
    }

    #[test]
    fn test_labels() {
        assert_eq!(Scalar::Null.to_label(), None);
        assert_eq!(Scalar::Integer(30).to_label().as_deref(), Some("30"));
        assert_eq!(Scalar::Float(2.5).to_label().as_deref(), Some("2.5"));
        assert_eq!(Scalar::Float(3.0).to_label().as_deref(), Some("3"));
        assert_eq!(Scalar::Bool(true).to_label().as_deref(), Some("true"));
        assert_eq!(Scalar::from("").to_label().as_deref(), Some(""));
    }

    #[test]
    fn test_json_round_trip_keeps_numbers() {
        let value: serde_json::Value = serde_json::json!({
            "name": "Alice",
            "age": 30,
            "score": 9.5,
            "active": true,
            "note": null,
            "tags": ["a", "b"]
        });
        let record = record_from_json(value).unwrap();
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "age", "score", "active", "note", "tags"]);
        assert_eq!(record["age"], Scalar::Integer(30));
        assert_eq!(record["score"], Scalar::Float(9.5));
        assert_eq!(record["tags"], Scalar::from(r#"["a","b"]"#));

        let out = serde_json::to_string(&record).unwrap();
        assert!(out.contains(r#""age":30"#));
        assert!(out.contains(r#""note":null"#));
    }

    #[test]
    fn test_record_from_non_object() {
        assert!(record_from_json(serde_json::json!([1, 2])).is_none());
    }

    #[test]
    fn test_type_tag_serde() {
        assert_eq!(serde_json::to_string(&TypeTag::Integer).unwrap(), r#""integer""#);
        let tag: TypeTag = serde_json::from_str(r#""date""#).unwrap();
        assert_eq!(tag, TypeTag::Date);
        assert!("uuid".parse::<TypeTag>().is_err());
    }

    #[test]
    fn test_field_descriptor_serializes_camel_case() {
        let fd = FieldDescriptor {
            field: "age".into(),
            type_tag: TypeTag::Integer,
            example_value: Scalar::Integer(30),
            sample_values: vec![Scalar::Integer(30), Scalar::Integer(25)],
        };
        let json = serde_json::to_value(&fd).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "field": "age",
                "type": "integer",
                "exampleValue": 30,
                "sampleValues": [30, 25]
            })
        );
    }
}
