//! Row normalization and dot-path flattening.

use serde_json::Value;
use std::borrow::Cow;

use crate::Row;

/// Coerce arbitrary input into a list of rows.
///
/// Arrays pass through untouched, a single object becomes a one-element list,
/// and anything else (null, numbers, strings, ...) degrades to an empty list.
pub fn normalize_data(input: Value) -> Vec<Value> {
    match input {
        Value::Array(rows) => rows,
        Value::Object(obj) => vec![Value::Object(obj)],
        _ => Vec::new(),
    }
}

/// Flatten `value` into `out`, prefixing every key with `prefix`.
///
/// Nested objects are walked and their keys joined with `.`; arrays and
/// scalars are stored as-is. A null input leaves `out` unchanged. A bare
/// array or scalar is stored under `prefix` itself, which is the empty key
/// at the top level.
pub fn flatten_object_into(value: &Value, prefix: &str, out: &mut Row) {
    match value {
        Value::Null => {}
        Value::Object(obj) => {
            for (key, child) in obj {
                let path = join_path(prefix, key);
                match child {
                    Value::Object(_) => flatten_object_into(child, &path, out),
                    leaf => {
                        out.insert(path, leaf.clone());
                    }
                }
            }
        }
        leaf => {
            out.insert(prefix.to_string(), leaf.clone());
        }
    }
}

/// Flatten a single value into a fresh row.
pub fn flatten_object(value: &Value) -> Row {
    let mut out = Row::new();
    flatten_object_into(value, "", &mut out);
    out
}

/// Flatten every row independently, preserving order.
pub fn flatten_array(rows: &[Value]) -> Vec<Value> {
    rows.iter()
        .map(|row| Value::Object(flatten_object(row)))
        .collect()
}

/// Quote a column name with `[...]` unless it is a bare `[A-Za-z0-9_]+` identifier.
pub fn escape_column_name(name: &str) -> Cow<'_, str> {
    let bare = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if bare {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("[{name}]"))
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}
