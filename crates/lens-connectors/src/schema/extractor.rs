//! Schema extraction from sampled rows.
//!
//! The field list comes from the sample according to a [`SchemaStrategy`];
//! each field's type is then a majority vote over its non-blank values.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::inference::infer_type_from_values;
use super::types::{FieldDescriptor, Record, Scalar, Schema};

/// Number of sample values kept per field.
pub const SAMPLE_VALUES_PER_FIELD: usize = 5;

/// How the set of schema fields is chosen from a sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaStrategy {
    /// Fields are the keys of the first row, in order. Keys that appear
    /// only in later rows are not part of the schema.
    #[default]
    FirstRow,
    /// Fields are the union of keys across all rows, in first-seen order.
    Union,
}

/// Infers a schema using the first row's keys as the field list.
#[must_use]
pub fn infer_schema_from_rows(rows: &[Record]) -> Schema {
    infer_schema_with(rows, SchemaStrategy::FirstRow)
}

/// Infers a schema with an explicit field-selection strategy.
///
/// An empty input yields an empty schema. Rows lacking a field contribute
/// nothing to it; null and empty-string values are skipped too.
#[must_use]
pub fn infer_schema_with(rows: &[Record], strategy: SchemaStrategy) -> Schema {
    let Some(first) = rows.first() else {
        return Vec::new();
    };

    let fields: Vec<&str> = match strategy {
        SchemaStrategy::FirstRow => first.keys().map(String::as_str).collect(),
        SchemaStrategy::Union => {
            let mut seen = indexmap::IndexSet::new();
            for row in rows {
                for key in row.keys() {
                    seen.insert(key.as_str());
                }
            }
            seen.into_iter().collect()
        }
    };

    let schema: Schema = fields
        .into_iter()
        .map(|field| describe_field(field, rows))
        .collect();

    debug!(
        rows = rows.len(),
        fields = schema.len(),
        ?strategy,
        "inferred schema from sample"
    );
    schema
}

fn describe_field(field: &str, rows: &[Record]) -> FieldDescriptor {
    let values: Vec<&Scalar> = rows
        .iter()
        .filter_map(|row| row.get(field))
        .filter(|v| !v.is_blank())
        .collect();

    FieldDescriptor {
        field: field.to_string(),
        type_tag: infer_type_from_values(values.iter().copied()),
        example_value: values.first().map_or(Scalar::Null, |v| (*v).clone()),
        sample_values: values
            .iter()
            .take(SAMPLE_VALUES_PER_FIELD)
            .map(|v| (*v).clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeTag;

    fn row(pairs: &[(&str, Scalar)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn people() -> Vec<Record> {
        vec![
            row(&[("name", "Alice".into()), ("age", "30".into()), ("city", "NY".into())]),
            row(&[("name", "Bob".into()), ("age", "25".into()), ("city", "LA".into())]),
            row(&[("name", "Carol".into()), ("age", "35".into()), ("city", "NY".into())]),
        ]
    }

    #[test]
    fn test_three_row_sample() {
        let schema = infer_schema_from_rows(&people());
        let names: Vec<&str> = schema.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["name", "age", "city"]);
        assert_eq!(schema[0].type_tag, TypeTag::String);
        assert_eq!(schema[1].type_tag, TypeTag::Integer);
        assert_eq!(schema[2].type_tag, TypeTag::String);
        assert_eq!(schema[1].example_value, Scalar::from("30"));
        assert_eq!(
            schema[1].sample_values,
            vec![Scalar::from("30"), Scalar::from("25"), Scalar::from("35")]
        );
    }

    #[test]
    fn test_empty_sample() {
        assert!(infer_schema_from_rows(&[]).is_empty());
    }

    #[test]
    fn test_all_blank_field() {
        let rows = vec![
            row(&[("a", Scalar::Null), ("b", "1".into())]),
            row(&[("a", "".into()), ("b", "2".into())]),
        ];
        let schema = infer_schema_from_rows(&rows);
        assert_eq!(schema[0].type_tag, TypeTag::String);
        assert_eq!(schema[0].example_value, Scalar::Null);
        assert!(schema[0].sample_values.is_empty());
    }

    #[test]
    fn test_sample_values_capped() {
        let rows: Vec<Record> = (0..8)
            .map(|i| row(&[("n", Scalar::Integer(i))]))
            .collect();
        let schema = infer_schema_from_rows(&rows);
        assert_eq!(schema[0].sample_values.len(), SAMPLE_VALUES_PER_FIELD);
        assert_eq!(schema[0].example_value, Scalar::Integer(0));
    }

    #[test]
    fn test_first_row_ignores_later_keys() {
        let rows = vec![
            row(&[("a", "1".into())]),
            row(&[("a", "2".into()), ("b", "x".into())]),
        ];
        let schema = infer_schema_from_rows(&rows);
        assert_eq!(schema.len(), 1);

        let schema = infer_schema_with(&rows, SchemaStrategy::Union);
        let names: Vec<&str> = schema.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(schema[1].sample_values, vec![Scalar::from("x")]);
    }

    #[test]
    fn test_missing_key_in_later_row_is_skipped() {
        let rows = vec![
            row(&[("a", "1".into()), ("b", "true".into())]),
            row(&[("a", "2".into())]),
        ];
        let schema = infer_schema_from_rows(&rows);
        assert_eq!(schema[1].type_tag, TypeTag::Boolean);
        assert_eq!(schema[1].sample_values.len(), 1);
    }
}
