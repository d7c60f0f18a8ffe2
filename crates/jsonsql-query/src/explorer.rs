//! UI-agnostic explorer state.
//!
//! An [`Explorer`] is what an editor front end holds on to: the prepared rows,
//! the schema and completion items derived from them, and the outcome of the
//! last query. Each run replaces result and error wholesale.

use jsonsql_core::{
    flatten_array, generate_completion_items, infer_schema_with, normalize_data, CompletionItem,
    Schema,
};
use serde_json::Value;

use crate::config::ExplorerConfig;
use crate::context::{ExecutionContext, QueryResult};
use crate::error::{ConfigError, QueryError};
use crate::guard::validate_query;
use crate::sqlite::SqliteEngine;

pub struct Explorer {
    config: ExplorerConfig,
    rows: Vec<Value>,
    schema: Option<Schema>,
    completions: Vec<CompletionItem>,
    context: ExecutionContext<SqliteEngine>,
    query: String,
    last_result: Option<QueryResult>,
    last_error: Option<String>,
}

impl Explorer {
    pub fn new(data: Value, config: ExplorerConfig) -> Result<Self, ExplorerInitError> {
        config.validate()?;
        let context = ExecutionContext::sqlite().map_err(QueryError::Execution)?;

        let mut rows = normalize_data(data);
        if config.flatten {
            rows = flatten_array(&rows);
        }

        let schema = (!rows.is_empty())
            .then(|| infer_schema_with(&rows, &config.table_name, &config.infer_options()));
        let completions = schema
            .as_ref()
            .map(generate_completion_items)
            .unwrap_or_default();

        Ok(Self {
            query: config.initial_query.clone(),
            config,
            rows,
            schema,
            completions,
            context,
            last_result: None,
            last_error: None,
        })
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Normalized (and, if configured, flattened) rows.
    pub fn rows(&self) -> &[Value] {
        &self.rows
    }

    /// `None` when there is no data to infer from.
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn completion_items(&self) -> &[CompletionItem] {
        &self.completions
    }

    /// `"N columns, M rows"`, or `None` without a schema.
    pub fn summary(&self) -> Option<String> {
        self.schema
            .as_ref()
            .map(|s| format!("{}, {} rows", s.summary(), self.rows.len()))
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, sql: impl Into<String>) {
        self.query = sql.into();
    }

    pub fn last_result(&self) -> Option<&QueryResult> {
        self.last_result.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Run the current query.
    pub fn run(&mut self) -> Result<&QueryResult, QueryError> {
        self.last_result = None;
        self.last_error = None;

        let outcome = validate_query(&self.query)
            .map_err(QueryError::from)
            .and_then(|()| {
                self.context.execute(
                    &self.query,
                    &self.rows,
                    &self.config.table_name,
                    self.config.row_cap(),
                )
            });

        match outcome {
            Ok(result) => Ok(self.last_result.insert(result)),
            Err(err) => {
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Replace the current query and run it.
    pub fn run_query(&mut self, sql: impl Into<String>) -> Result<&QueryResult, QueryError> {
        self.set_query(sql);
        self.run()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExplorerInitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Query(#[from] QueryError),
}
