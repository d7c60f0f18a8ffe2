//! Column schema inference over sampled rows.
//!
//! Each sampled row contributes one observed type per key. The non-null tags
//! of a column are collected into an [`ObservedTypes`] and resolved in this
//! order:
//!
//! 1. a single tag is used as is;
//! 2. any `TEXT` makes the column `TEXT`;
//! 3. `INTEGER` together with `REAL` makes it `REAL`;
//! 4. otherwise the first tag observed wins, so `BOOLEAN` then `INTEGER` is
//!    `BOOLEAN` and `ARRAY` then `DATE` then `OBJECT` is `ARRAY`.
//!
//! `NULL` never takes part in resolution; it only drives nullability.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Table name used when the caller does not pick one.
pub const DEFAULT_TABLE_NAME: &str = "data";

/// Number of leading rows inspected by [`infer_schema`].
pub const DEFAULT_SAMPLE_SIZE: usize = 100;

/// Primitive type tag of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
    Integer,
    Real,
    Boolean,
    Date,
    Text,
    Array,
    Object,
    Null,
}

impl SqlType {
    pub fn as_str(self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Date => "DATE",
            SqlType::Text => "TEXT",
            SqlType::Array => "ARRAY",
            SqlType::Object => "OBJECT",
            SqlType::Null => "NULL",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The non-null tags seen for one column, in first-observed order.
///
/// [`merge`](Self::merge) is associative, so observations can be folded
/// incrementally or combined from separate chunks of a dataset. It is not
/// commutative: the left side keeps its first-observed tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservedTypes {
    first: SqlType,
    seen: u8,
}

impl ObservedTypes {
    /// Observations holding just `tag`, or `None` for `NULL`.
    pub fn of(tag: SqlType) -> Option<Self> {
        (tag != SqlType::Null).then(|| Self {
            first: tag,
            seen: tag_bit(tag),
        })
    }

    pub fn observe(&mut self, tag: SqlType) {
        if let Some(later) = Self::of(tag) {
            *self = self.merge(later);
        }
    }

    /// `self` observed before `later`.
    pub fn merge(self, later: ObservedTypes) -> ObservedTypes {
        Self {
            first: self.first,
            seen: self.seen | later.seen,
        }
    }

    /// The tag, when only one kind was ever observed.
    pub fn single(&self) -> Option<SqlType> {
        (self.seen.count_ones() == 1).then_some(self.first)
    }

    pub fn contains(&self, tag: SqlType) -> bool {
        self.seen & tag_bit(tag) != 0
    }

    /// The column's primary type.
    pub fn resolve(&self) -> SqlType {
        if let Some(tag) = self.single() {
            tag
        } else if self.contains(SqlType::Text) {
            SqlType::Text
        } else if self.contains(SqlType::Integer) && self.contains(SqlType::Real) {
            SqlType::Real
        } else {
            self.first
        }
    }
}

fn tag_bit(tag: SqlType) -> u8 {
    match tag {
        SqlType::Integer => 1,
        SqlType::Real => 1 << 1,
        SqlType::Boolean => 1 << 2,
        SqlType::Date => 1 << 3,
        SqlType::Text => 1 << 4,
        SqlType::Array => 1 << 5,
        SqlType::Object => 1 << 6,
        SqlType::Null => 0,
    }
}

/// Knobs for schema inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferOptions {
    /// Rows inspected from the front of the dataset. `None` inspects all rows.
    pub sample_size: Option<usize>,
    /// Classify RFC 3339 timestamps and `YYYY-MM-DD` strings as `DATE`.
    pub detect_dates: bool,
}

impl Default for InferOptions {
    fn default() -> Self {
        Self {
            sample_size: Some(DEFAULT_SAMPLE_SIZE),
            detect_dates: false,
        }
    }
}

impl InferOptions {
    /// Inspect every row, e.g. when binding a table to an engine.
    pub fn full_scan() -> Self {
        Self {
            sample_size: None,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: SqlType,
    pub nullable: bool,
}

impl SchemaColumn {
    /// Editor detail text: `TEXT` or `TEXT | NULL`.
    pub fn detail(&self) -> String {
        if self.nullable {
            format!("{} | NULL", self.column_type)
        } else {
            self.column_type.to_string()
        }
    }
}

/// Snapshot of the columns found in a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub table_name: String,
    pub columns: Vec<SchemaColumn>,
}

impl Schema {
    pub fn column(&self, name: &str) -> Option<&SchemaColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn summary(&self) -> String {
        format!("{} columns", self.columns.len())
    }
}

/// Type tag of a single value.
pub fn infer_type(value: &Value, options: &InferOptions) -> SqlType {
    match value {
        Value::Null => SqlType::Null,
        Value::Bool(_) => SqlType::Boolean,
        Value::Number(n) => {
            let integral = n.is_i64()
                || n.is_u64()
                || n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0);
            if integral {
                SqlType::Integer
            } else {
                SqlType::Real
            }
        }
        Value::String(s) if options.detect_dates && looks_like_date(s) => SqlType::Date,
        Value::String(_) => SqlType::Text,
        Value::Array(_) => SqlType::Array,
        Value::Object(_) => SqlType::Object,
    }
}

fn looks_like_date(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok() || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Infer a schema from the first [`DEFAULT_SAMPLE_SIZE`] rows.
pub fn infer_schema(rows: &[Value], table_name: &str) -> Schema {
    infer_schema_with(rows, table_name, &InferOptions::default())
}

#[derive(Debug, Default)]
struct ColumnStats {
    name: String,
    observed: Option<ObservedTypes>,
    saw_null: bool,
    seen_in: usize,
}

pub fn infer_schema_with(rows: &[Value], table_name: &str, options: &InferOptions) -> Schema {
    let sample_len = options
        .sample_size
        .map_or(rows.len(), |n| n.min(rows.len()));

    let mut stats: Vec<ColumnStats> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut object_rows = 0usize;

    for row in &rows[..sample_len] {
        let Value::Object(obj) = row else {
            continue;
        };
        object_rows += 1;

        for (key, value) in obj {
            let slot = *index.entry(key.clone()).or_insert_with(|| {
                stats.push(ColumnStats {
                    name: key.clone(),
                    ..ColumnStats::default()
                });
                stats.len() - 1
            });
            let col = &mut stats[slot];
            col.seen_in += 1;

            match (infer_type(value, options), col.observed.as_mut()) {
                (SqlType::Null, _) => col.saw_null = true,
                (tag, Some(observed)) => observed.observe(tag),
                (tag, None) => col.observed = ObservedTypes::of(tag),
            }
        }
    }

    let columns = stats
        .into_iter()
        .map(|col| SchemaColumn {
            // A key missing from some sampled row counts as null there.
            nullable: col.saw_null || col.observed.is_none() || col.seen_in < object_rows,
            column_type: col.observed.map_or(SqlType::Text, |o| o.resolve()),
            name: col.name,
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        table = table_name,
        sampled = sample_len,
        columns = columns.len(),
        "inferred schema"
    );

    Schema {
        table_name: table_name.to_string(),
        columns,
    }
}
