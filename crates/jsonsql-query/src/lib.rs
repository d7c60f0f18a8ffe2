//! SQL over in-memory JSON rows.
//!
//! The pieces, in the order a query flows through them:
//! - [`guard`]: shallow denylist check before anything touches an engine
//! - [`context`]: an [`ExecutionContext`] owns one engine and binds rows to a
//!   temporary table for the duration of a single query
//! - [`engine`] / [`sqlite`]: the engine seam and its embedded SQLite backend
//! - [`explorer`]: ties data shaping, schema, completions and execution together
//!
//! ```no_run
//! use serde_json::json;
//!
//! let rows = vec![json!({ "id": 1, "name": "Alice" }), json!({ "id": 2, "name": "Bob" })];
//! let result = jsonsql_query::execute_query("SELECT name FROM data WHERE id > 1", &rows, "data", None)?;
//! assert_eq!(result.rows.len(), 1);
//! # Ok::<(), jsonsql_query::QueryError>(())
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod explorer;
pub mod guard;
pub mod sqlite;

pub use config::ExplorerConfig;
pub use context::{execute_query, execute_query_async, ExecutionContext, QueryRequest, QueryResult};
pub use engine::{table_columns, EngineOutput, SqlEngine, TableColumn};
pub use error::{ConfigError, EngineError, QueryError, ValidationError};
pub use explorer::{Explorer, ExplorerInitError};
pub use guard::{validate_query, QueryValidation, DANGEROUS_KEYWORDS};
pub use sqlite::SqliteEngine;
