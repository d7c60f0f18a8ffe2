//! The SQL engine seam.
//!
//! An engine owns a table namespace. jsonsql only ever asks it to drop, create
//! and fill one table, then run a query against it.

use jsonsql_core::{infer_type, InferOptions, ObservedTypes, Row, SqlType};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::EngineError;

/// What an engine hands back for a query.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOutput {
    Rows(Vec<Row>),
    /// A bare value, e.g. from engines that return aggregates unwrapped.
    Scalar(Value),
}

impl EngineOutput {
    /// Rows, with a scalar wrapped as a single row.
    ///
    /// A scalar object is the row itself; any other scalar is stored under `value`.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            EngineOutput::Rows(rows) => rows,
            EngineOutput::Scalar(Value::Object(row)) => vec![row],
            EngineOutput::Scalar(other) => {
                let mut row = Row::new();
                row.insert("value".to_string(), other);
                vec![row]
            }
        }
    }
}

/// A column of the bound table, named by its JSON key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub key: String,
    /// Set when every non-null value of the column has this type.
    pub uniform_type: Option<SqlType>,
}

/// Every key of every object row, in first-discovery order.
///
/// Unlike schema inference this looks at all rows, so a key first seen late in
/// the data still gets a column.
pub fn table_columns(rows: &[Value]) -> Vec<TableColumn> {
    let options = InferOptions::full_scan();
    let mut columns: Vec<(String, Option<ObservedTypes>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for row in rows {
        let Value::Object(obj) = row else {
            continue;
        };
        for (key, value) in obj {
            let slot = *index.entry(key.as_str()).or_insert_with(|| {
                columns.push((key.clone(), None));
                columns.len() - 1
            });
            let tag = infer_type(value, &options);
            let observed = &mut columns[slot].1;
            match observed {
                Some(o) => o.observe(tag),
                None => *observed = ObservedTypes::of(tag),
            }
        }
    }

    columns
        .into_iter()
        .map(|(key, observed)| TableColumn {
            key,
            uniform_type: observed.and_then(|o| o.single()),
        })
        .collect()
}

pub trait SqlEngine: Send {
    fn drop_table_if_exists(&mut self, table: &str) -> Result<(), EngineError>;

    fn create_table(&mut self, table: &str, columns: &[TableColumn]) -> Result<(), EngineError>;

    /// Store `rows` in `table`; keys missing from a row are bound as NULL.
    fn load_rows(&mut self, table: &str, columns: &[TableColumn], rows: &[Value]) -> Result<(), EngineError>;

    fn query(&mut self, sql: &str) -> Result<EngineOutput, EngineError>;
}
