//! Embedded SQLite backend.
//!
//! Each `SqliteEngine` owns a private in-memory database, so two engines never
//! see each other's tables.
//!
//! Every column is declared with a type containing `BLOB`, which gives it BLOB
//! affinity: values keep the storage class they were bound with (no coercion
//! of `"007"` into `7`). The rest of the declared type records how to turn a
//! value back into JSON. SQLite has no boolean, array or object storage, so
//! those are bound as `0`/`1` and JSON text and restored only when a result
//! column refers straight to such a column; computed and aliased expressions
//! come back as SQLite produced them.
//!
//! SQLite folds ASCII case in column names while JSON keys are case-sensitive.
//! Keys that collide under that folding (and the empty key) are bound under a
//! generated name such as `name_2`, and mapped back to the key on output.

use jsonsql_core::{Row, SqlType};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Connection;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::engine::{EngineOutput, SqlEngine, TableColumn};
use crate::error::EngineError;

/// Stand-in column for tables whose rows have no keys at all.
const PLACEHOLDER_COLUMN: &str = "__jsonsql_empty";

/// SQL name given to the empty JSON key.
const EMPTY_KEY_COLUMN: &str = "value";

pub struct SqliteEngine {
    conn: Connection,
    /// Lowercased generated SQL name -> JSON key, for keys that could not be
    /// used as is.
    renamed: HashMap<String, String>,
}

impl SqliteEngine {
    pub fn open_in_memory() -> Result<Self, EngineError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            renamed: HashMap::new(),
        })
    }

    /// Output key and restore type for each result column; `None` is hidden.
    fn output_columns(&self, stmt: &rusqlite::Statement<'_>) -> Vec<Option<(String, Option<SqlType>)>> {
        let mut taken = HashSet::new();
        stmt.columns()
            .iter()
            .map(|col| {
                let name = col.name();
                if name == PLACEHOLDER_COLUMN {
                    return None;
                }
                // Only direct references to a table column carry a declared type.
                let (key, restore) = match col.decl_type() {
                    Some(decl) => (
                        self.renamed
                            .get(&name.to_ascii_lowercase())
                            .map_or(name, String::as_str),
                        restore_type(decl),
                    ),
                    None => (name, None),
                };
                Some((unique_name(key, &mut taken), restore))
            })
            .collect()
    }
}

impl SqlEngine for SqliteEngine {
    fn drop_table_if_exists(&mut self, table: &str) -> Result<(), EngineError> {
        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))?;
        self.renamed.clear();
        Ok(())
    }

    fn create_table(&mut self, table: &str, columns: &[TableColumn]) -> Result<(), EngineError> {
        let names = sql_column_names(columns);
        self.renamed = columns
            .iter()
            .zip(&names)
            .filter(|(column, name)| column.key != **name)
            .map(|(column, name)| {
                warn!(table, key = %column.key, column = %name, "renamed column for sqlite");
                (name.to_ascii_lowercase(), column.key.clone())
            })
            .collect();

        let column_list = if columns.is_empty() {
            quote_ident(PLACEHOLDER_COLUMN)
        } else {
            columns
                .iter()
                .zip(&names)
                .map(|(column, name)| format!("{} {}", quote_ident(name), decl_type(column.uniform_type)))
                .collect::<Vec<_>>()
                .join(", ")
        };
        self.conn.execute_batch(&format!(
            "CREATE TABLE {} ({column_list})",
            quote_ident(table)
        ))?;
        Ok(())
    }

    fn load_rows(&mut self, table: &str, columns: &[TableColumn], rows: &[Value]) -> Result<(), EngineError> {
        let insert = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table))
        } else {
            let names = sql_column_names(columns)
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            let params = (1..=columns.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("INSERT INTO {} ({names}) VALUES ({params})", quote_ident(table))
        };

        let tx = self.conn.transaction()?;
        let mut loaded = 0usize;
        {
            let mut stmt = tx.prepare(&insert)?;
            for row in rows {
                let Value::Object(obj) = row else {
                    continue;
                };
                let values = columns.iter().map(|c| to_sql_value(obj.get(&c.key)));
                stmt.execute(rusqlite::params_from_iter(values))?;
                loaded += 1;
            }
        }
        tx.commit()?;

        debug!(table, rows = loaded, columns = columns.len(), "loaded rows into sqlite");
        Ok(())
    }

    fn query(&mut self, sql: &str) -> Result<EngineOutput, EngineError> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns = self.output_columns(&stmt);

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (i, column) in columns.iter().enumerate() {
                let Some((key, restore)) = column else {
                    continue;
                };
                record.insert(key.clone(), from_sql_value(row.get_ref(i)?, *restore));
            }
            out.push(record);
        }

        Ok(EngineOutput::Rows(out))
    }
}

/// SQL names for `columns`, distinct under ASCII case folding.
///
/// The first key of each folded spelling keeps its name; later ones get the
/// first free `<key>_<n>`, starting at 2.
fn sql_column_names(columns: &[TableColumn]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut names: Vec<Option<String>> = columns
        .iter()
        .map(|c| {
            (!c.key.is_empty() && taken.insert(c.key.to_ascii_lowercase())).then(|| c.key.clone())
        })
        .collect();

    for (slot, column) in names.iter_mut().zip(columns) {
        if slot.is_some() {
            continue;
        }
        let base = if column.key.is_empty() {
            EMPTY_KEY_COLUMN
        } else {
            column.key.as_str()
        };
        let mut candidate = base.to_string();
        let mut n = 1;
        while !taken.insert(candidate.to_ascii_lowercase()) {
            n += 1;
            candidate = format!("{base}_{n}");
        }
        *slot = Some(candidate);
    }

    names.into_iter().flatten().collect()
}

/// `name`, or the first free `<name>_<n>` when a result already has it.
fn unique_name(name: &str, taken: &mut HashSet<String>) -> String {
    let mut candidate = name.to_string();
    let mut n = 1;
    while !taken.insert(candidate.clone()) {
        n += 1;
        candidate = format!("{name}_{n}");
    }
    candidate
}

fn decl_type(uniform_type: Option<SqlType>) -> &'static str {
    match uniform_type {
        Some(SqlType::Boolean) => "BLOB_BOOLEAN",
        Some(SqlType::Array) => "BLOB_ARRAY",
        Some(SqlType::Object) => "BLOB_OBJECT",
        _ => "BLOB",
    }
}

fn restore_type(decl_type: &str) -> Option<SqlType> {
    match decl_type {
        "BLOB_BOOLEAN" => Some(SqlType::Boolean),
        "BLOB_ARRAY" => Some(SqlType::Array),
        "BLOB_OBJECT" => Some(SqlType::Object),
        _ => None,
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql_value(value: Option<&Value>) -> SqlValue {
    match value {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        Some(Value::String(s)) => SqlValue::Text(s.clone()),
        Some(nested @ (Value::Array(_) | Value::Object(_))) => SqlValue::Text(nested.to_string()),
    }
}

fn from_sql_value(cell: ValueRef<'_>, restore: Option<SqlType>) -> Value {
    match (cell, restore) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(i @ (0 | 1)), Some(SqlType::Boolean)) => Value::Bool(i == 1),
        (ValueRef::Integer(i), _) => Value::from(i),
        (ValueRef::Real(f), _) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        (ValueRef::Text(bytes), Some(SqlType::Array | SqlType::Object)) => {
            let text = String::from_utf8_lossy(bytes);
            match serde_json::from_str::<Value>(&text) {
                Ok(parsed) => parsed,
                Err(_) => Value::String(text.into_owned()),
            }
        }
        (ValueRef::Text(bytes), _) | (ValueRef::Blob(bytes), _) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
