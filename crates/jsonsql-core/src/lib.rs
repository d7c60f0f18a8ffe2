//! JSON shaping for jsonsql
//!
//! Turns arbitrary JSON input into something a SQL engine can query:
//! - Normalization of single objects / arrays / junk input into a row list
//! - Flattening of nested objects into dot-path keys (`address.city`)
//! - Schema inference (column name, type tag, nullability) from a row sample
//! - Editor completion items derived from the inferred schema

pub mod completion;
pub mod flatten;
pub mod schema;

pub use completion::{generate_completion_items, CompletionItem, CompletionKind, SQL_KEYWORDS};
pub use flatten::{escape_column_name, flatten_array, flatten_object, flatten_object_into, normalize_data};
pub use schema::{
    infer_schema, infer_schema_with, infer_type, InferOptions, ObservedTypes, Schema, SchemaColumn,
    SqlType, DEFAULT_SAMPLE_SIZE, DEFAULT_TABLE_NAME,
};

/// A single record: string keys mapped to JSON values, in insertion order.
pub type Row = serde_json::Map<String, serde_json::Value>;
