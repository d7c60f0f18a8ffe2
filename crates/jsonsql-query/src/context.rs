//! Query execution against a bound temporary table.

use jsonsql_core::{Row, DEFAULT_TABLE_NAME};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::{table_columns, EngineOutput, SqlEngine};
use crate::error::{EngineError, QueryError};
use crate::sqlite::SqliteEngine;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Result rows, truncated to the row cap.
    pub rows: Vec<Row>,
    /// Wall-clock milliseconds for bind + query + collect.
    pub execution_time: f64,
    /// Rows produced before truncation; always `>= rows.len()`.
    pub row_count: usize,
}

impl QueryResult {
    pub fn is_truncated(&self) -> bool {
        self.row_count > self.rows.len()
    }
}

/// Owned inputs for [`execute_query_async`].
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub sql: String,
    pub data: Arc<[Value]>,
    pub table_name: String,
    pub max_rows: Option<usize>,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>, data: impl Into<Arc<[Value]>>) -> Self {
        Self {
            sql: sql.into(),
            data: data.into(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            max_rows: None,
        }
    }

    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }
}

/// One engine and the table namespace it owns.
///
/// Executions on the same context run one at a time. Separate contexts share
/// nothing, so callers that need concurrency should hold one context each.
pub struct ExecutionContext<E: SqlEngine = SqliteEngine> {
    id: Uuid,
    engine: Mutex<E>,
}

impl ExecutionContext<SqliteEngine> {
    /// A context over a private in-memory SQLite database.
    pub fn sqlite() -> Result<Self, EngineError> {
        Ok(Self::new(SqliteEngine::open_in_memory()?))
    }
}

impl<E: SqlEngine> ExecutionContext<E> {
    pub fn new(engine: E) -> Self {
        let id = Uuid::new_v4();
        info!(context = %id, "execution context created");
        Self {
            id,
            engine: Mutex::new(engine),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Bind `data` as `table_name`, run `sql`, and drop the table again.
    ///
    /// `max_rows` of `None` or `Some(0)` leaves the result uncapped.
    pub fn execute(
        &self,
        sql: &str,
        data: &[Value],
        table_name: &str,
        max_rows: Option<usize>,
    ) -> Result<QueryResult, QueryError> {
        let mut engine = self.engine.lock();
        let start = Instant::now();

        let output = {
            let mut binding = TableBinding::new(&mut *engine, table_name, self.id);
            binding
                .bind(data)
                .and_then(|()| binding.query(sql))
                .map_err(QueryError::Execution)?
        };

        let mut rows = output.into_rows();
        let row_count = rows.len();
        if let Some(cap) = max_rows.filter(|&n| n > 0) {
            rows.truncate(cap);
        }
        let execution_time = start.elapsed().as_secs_f64() * 1000.0;

        debug!(
            context = %self.id,
            table = table_name,
            row_count,
            returned = rows.len(),
            execution_ms = execution_time,
            "query executed"
        );

        Ok(QueryResult {
            rows,
            execution_time,
            row_count,
        })
    }
}

/// Temporary table held for the span of one execution.
///
/// Dropping the binding drops the table, whether or not binding or the query
/// succeeded. Drop failures are logged and never replace the query outcome.
struct TableBinding<'a, E: SqlEngine> {
    engine: &'a mut E,
    table: &'a str,
    context: Uuid,
}

impl<'a, E: SqlEngine> TableBinding<'a, E> {
    fn new(engine: &'a mut E, table: &'a str, context: Uuid) -> Self {
        Self {
            engine,
            table,
            context,
        }
    }

    fn bind(&mut self, data: &[Value]) -> Result<(), EngineError> {
        let columns = table_columns(data);

        let skipped = data.iter().filter(|row| !row.is_object()).count();
        if skipped > 0 {
            warn!(context = %self.context, table = self.table, skipped, "skipping non-object rows");
        }

        self.engine.drop_table_if_exists(self.table)?;
        self.engine.create_table(self.table, &columns)?;
        self.engine.load_rows(self.table, &columns, data)
    }

    fn query(&mut self, sql: &str) -> Result<EngineOutput, EngineError> {
        self.engine.query(sql)
    }
}

impl<E: SqlEngine> Drop for TableBinding<'_, E> {
    fn drop(&mut self) {
        if let Err(err) = self.engine.drop_table_if_exists(self.table) {
            warn!(
                context = %self.context,
                table = self.table,
                error = %err,
                "failed to drop temporary table"
            );
        }
    }
}

/// Run `sql` against `data` bound as `table_name` on a fresh SQLite context.
pub fn execute_query(
    sql: &str,
    data: &[Value],
    table_name: &str,
    max_rows: Option<usize>,
) -> Result<QueryResult, QueryError> {
    let context = ExecutionContext::sqlite().map_err(QueryError::Execution)?;
    context.execute(sql, data, table_name, max_rows)
}

/// [`ExecutionContext::execute`] on the blocking pool.
///
/// There is no cancellation: once dispatched the query runs to completion.
pub async fn execute_query_async<E>(
    context: Arc<ExecutionContext<E>>,
    request: QueryRequest,
) -> Result<QueryResult, QueryError>
where
    E: SqlEngine + 'static,
{
    tokio::task::spawn_blocking(move || {
        context.execute(
            &request.sql,
            &request.data,
            &request.table_name,
            request.max_rows,
        )
    })
    .await
    .map_err(|e| QueryError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TableColumn;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Engine that records calls and returns canned output.
    struct FakeEngine {
        output: Option<EngineOutput>,
        fail_drop: bool,
        drops: Arc<AtomicUsize>,
    }

    impl FakeEngine {
        fn returning(output: EngineOutput) -> (Self, Arc<AtomicUsize>) {
            let drops = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    output: Some(output),
                    fail_drop: false,
                    drops: drops.clone(),
                },
                drops,
            )
        }
    }

    impl SqlEngine for FakeEngine {
        fn drop_table_if_exists(&mut self, _table: &str) -> Result<(), EngineError> {
            let n = self.drops.fetch_add(1, Ordering::SeqCst);
            // The first drop is the pre-bind cleanup; fail only the teardown.
            if self.fail_drop && n > 0 {
                return Err(EngineError::Message("drop refused".to_string()));
            }
            Ok(())
        }

        fn create_table(&mut self, _table: &str, _columns: &[TableColumn]) -> Result<(), EngineError> {
            Ok(())
        }

        fn load_rows(&mut self, _table: &str, _columns: &[TableColumn], _rows: &[Value]) -> Result<(), EngineError> {
            Ok(())
        }

        fn query(&mut self, _sql: &str) -> Result<EngineOutput, EngineError> {
            self.output
                .clone()
                .ok_or_else(|| EngineError::Message("no such column: nope".to_string()))
        }
    }

    fn people() -> Vec<Value> {
        vec![json!({ "id": 1, "name": "Alice" }), json!({ "id": 2, "name": "Bob" })]
    }

    #[test]
    fn test_select_all_rows() {
        let result = execute_query("SELECT * FROM data", &people(), "data", None).expect("query");

        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.row_count, 2);
        assert!(result.execution_time > 0.0);
        assert_eq!(Value::Object(result.rows[0].clone()), json!({ "id": 1, "name": "Alice" }));
        assert!(!result.is_truncated());
    }

    #[test]
    fn test_where_filter() {
        let data = vec![
            json!({ "id": 1, "name": "Alice", "age": 28 }),
            json!({ "id": 2, "name": "Bob", "age": 30 }),
            json!({ "id": 3, "name": "Carol", "age": 25 }),
        ];

        let result = execute_query("SELECT name FROM data WHERE age > 27", &data, "data", None)
            .expect("query");
        let names: Vec<&Value> = result.rows.iter().map(|r| &r["name"]).collect();
        assert_eq!(names, [&json!("Alice"), &json!("Bob")]);
    }

    #[test]
    fn test_group_by_aggregate() {
        let data = vec![
            json!({ "dept": "Eng", "salary": 100 }),
            json!({ "dept": "Eng", "salary": 110 }),
            json!({ "dept": "Sales", "salary": 90 }),
        ];

        let result = execute_query(
            "SELECT dept, AVG(salary) AS avg_sal FROM data GROUP BY dept",
            &data,
            "data",
            None,
        )
        .expect("query");

        assert_eq!(result.rows.len(), 2);
        let eng = result
            .rows
            .iter()
            .find(|r| r["dept"] == "Eng")
            .expect("Eng group");
        assert_eq!(eng["avg_sal"].as_f64(), Some(105.0));
    }

    #[test]
    fn test_row_cap_keeps_full_count() {
        let data: Vec<Value> = (0..100).map(|i| json!({ "id": i })).collect();

        let result = execute_query("SELECT * FROM data", &data, "data", Some(10)).expect("query");
        assert_eq!(result.rows.len(), 10);
        assert_eq!(result.row_count, 100);
        assert!(result.is_truncated());
    }

    #[test]
    fn test_zero_cap_means_uncapped() {
        let result = execute_query("SELECT * FROM data", &people(), "data", Some(0)).expect("query");
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn test_invalid_sql_is_wrapped() {
        let err = execute_query("INVALID SQL", &[json!({ "id": 1 })], "data", None)
            .expect_err("should fail");
        assert!(matches!(err, QueryError::Execution(_)));
        assert!(err.to_string().starts_with("Query execution failed: "), "{err}");
    }

    #[test]
    fn test_custom_table_name() {
        let result = execute_query("SELECT COUNT(*) AS n FROM users", &people(), "users", None)
            .expect("query");
        assert_eq!(result.rows[0]["n"], 2);

        let err = execute_query("SELECT * FROM data", &people(), "users", None)
            .expect_err("data is not bound");
        assert!(err.to_string().contains("no such table"), "{err}");
    }

    #[test]
    fn test_table_is_dropped_after_success_and_failure() {
        let context = ExecutionContext::sqlite().expect("context");
        context
            .execute("SELECT * FROM data", &people(), "data", None)
            .expect("query");
        context
            .execute("SELECT nope FROM data", &people(), "data", None)
            .expect_err("unknown column");

        let mut engine = context.engine.lock();
        let err = engine.query("SELECT * FROM data").expect_err("table gone");
        assert!(err.to_string().contains("no such table"), "{err}");
    }

    #[test]
    fn test_contexts_do_not_share_tables() {
        let a = ExecutionContext::sqlite().expect("context a");
        let b = ExecutionContext::sqlite().expect("context b");
        assert_ne!(a.id(), b.id());

        let ra = a
            .execute("SELECT * FROM data", &people(), "data", None)
            .expect("a");
        let rb = b
            .execute("SELECT * FROM data", &people()[..1], "data", None)
            .expect("b");
        assert_eq!((ra.row_count, rb.row_count), (2, 1));
    }

    #[test]
    fn test_scalar_output_is_wrapped_before_cap() {
        let (engine, _) = FakeEngine::returning(EngineOutput::Scalar(json!(7)));
        let context = ExecutionContext::new(engine);

        let result = context
            .execute("SELECT VALUE COUNT(*) FROM data", &people(), "data", Some(5))
            .expect("query");
        assert_eq!(result.row_count, 1);
        assert_eq!(result.rows[0]["value"], 7);
    }

    #[test]
    fn test_teardown_failure_does_not_mask_result() {
        let (mut engine, drops) = FakeEngine::returning(EngineOutput::Rows(vec![Row::new()]));
        engine.fail_drop = true;
        let context = ExecutionContext::new(engine);

        let result = context
            .execute("SELECT * FROM data", &people(), "data", None)
            .expect("teardown failure is swallowed");
        assert_eq!(result.row_count, 1);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_teardown_runs_after_engine_failure() {
        let (mut engine, drops) = FakeEngine::returning(EngineOutput::Rows(Vec::new()));
        engine.output = None;
        let context = ExecutionContext::new(engine);

        let err = context
            .execute("SELECT nope FROM data", &people(), "data", None)
            .expect_err("engine error");
        assert_eq!(err.to_string(), "Query execution failed: no such column: nope");
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_execution_time_excludes_lock_wait() {
        let (engine, _) = FakeEngine::returning(EngineOutput::Rows(Vec::new()));
        let context = Arc::new(ExecutionContext::new(engine));

        let held = context.engine.lock();
        let worker = {
            let context = Arc::clone(&context);
            std::thread::spawn(move || context.execute("SELECT 1", &[], "data", None))
        };
        std::thread::sleep(Duration::from_millis(200));
        drop(held);

        let result = worker.join().expect("worker").expect("query");
        assert!(result.execution_time < 200.0, "{} ms", result.execution_time);
    }

    #[test]
    fn test_case_colliding_keys_are_queryable() {
        let data = vec![json!({ "Name": "a", "name": "b" })];

        let result = execute_query("SELECT * FROM data", &data, "data", None).expect("query");
        assert_eq!(Value::Object(result.rows[0].clone()), json!({ "Name": "a", "name": "b" }));
    }

    #[test]
    fn test_aggregate_alias_keeps_number() {
        let data = vec![json!({ "id": 1, "active": true }), json!({ "id": 2, "active": false })];

        let result = execute_query(
            "SELECT COUNT(*) AS active FROM data WHERE id = 1",
            &data,
            "data",
            None,
        )
        .expect("query");
        assert_eq!(result.rows[0]["active"], json!(1));
    }

    #[tokio::test]
    async fn test_async_execution() {
        let context = Arc::new(ExecutionContext::sqlite().expect("context"));
        let request = QueryRequest::new("SELECT id FROM data ORDER BY id DESC", people()).max_rows(1);

        let result = execute_query_async(context, request).await.expect("query");
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.row_count, 2);
        assert_eq!(result.rows[0]["id"], 2);
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = QueryResult {
            rows: Vec::new(),
            execution_time: 1.5,
            row_count: 0,
        };
        assert_eq!(
            serde_json::to_value(&result).expect("serialize"),
            json!({ "rows": [], "executionTime": 1.5, "rowCount": 0 })
        );
    }
}
