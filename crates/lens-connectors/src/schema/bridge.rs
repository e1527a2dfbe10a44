//! Conversion from inferred schemas to Arrow schemas.
//!
//! Lets downstream consumers that speak Arrow reuse the inferred field list
//! without re-sampling the source.

use arrow_schema::{DataType, Field, Schema as ArrowSchema};

use super::types::{FieldDescriptor, TypeTag};

/// Maps a [`TypeTag`] to the Arrow type used to represent it.
#[must_use]
pub fn type_tag_to_arrow(tag: TypeTag) -> DataType {
    match tag {
        TypeTag::Integer => DataType::Int64,
        TypeTag::Float => DataType::Float64,
        TypeTag::Boolean => DataType::Boolean,
        TypeTag::Date => DataType::Date32,
        TypeTag::String => DataType::Utf8,
    }
}

/// Builds an Arrow schema from inferred field descriptors.
///
/// Every field is nullable: inference runs on a sample, so absence of nulls
/// there says nothing about the full source.
#[must_use]
pub fn to_arrow_schema(fields: &[FieldDescriptor]) -> ArrowSchema {
    ArrowSchema::new(
        fields
            .iter()
            .map(|f| Field::new(&f.field, type_tag_to_arrow(f.type_tag), true))
            .collect::<Vec<_>>(),
    )
}
