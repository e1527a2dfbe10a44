//! Schema inference.
//!
//! Given a sample of rows from any source, produce a per-field
//! [`FieldDescriptor`] with a semantic [`TypeTag`], an example value, and a
//! handful of sample values.

pub mod bridge;
pub mod extractor;
pub mod inference;
pub mod types;

pub use bridge::to_arrow_schema;
pub use extractor::{infer_schema_from_rows, infer_schema_with, SchemaStrategy};
pub use inference::{infer_type, infer_type_from_values};
pub use types::{record_from_json, FieldDescriptor, Record, Scalar, Schema, TypeTag};
