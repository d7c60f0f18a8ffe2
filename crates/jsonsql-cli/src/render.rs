//! Plain-text rendering of schemas and result sets.

use jsonsql_core::{Row, Schema};
use jsonsql_query::QueryResult;
use serde_json::Value;

/// Cells wider than this are cut and suffixed with `…`.
const MAX_CELL_WIDTH: usize = 40;

/// `NULL` for null, compact JSON for arrays/objects, the bare text otherwise.
pub fn format_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "NULL".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn render_result(result: &QueryResult) -> String {
    if result.rows.is_empty() {
        return "No results.\n".to_string();
    }

    let mut out = String::new();
    let plural = if result.row_count == 1 { "" } else { "s" };
    out.push_str(&format!("{} row{plural}", result.row_count));
    if result.is_truncated() {
        out.push_str(&format!(" (showing first {})", result.rows.len()));
    }
    out.push('\n');

    // Column set comes from the first row, like a result grid header.
    let columns: Vec<String> = result.rows[0].keys().cloned().collect();
    let body: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row_cells(row, &columns))
        .collect();
    out.push_str(&render_grid(&columns, &body));
    out
}

pub fn render_timing(result: &QueryResult) -> String {
    format!("{} rows in {:.2} ms", result.row_count, result.execution_time)
}

pub fn render_schema(schema: &Schema, row_count: usize) -> String {
    let mut out = format!(
        "table {}: {}, {} rows\n",
        schema.table_name,
        schema.summary(),
        row_count
    );
    if schema.columns.is_empty() {
        return out;
    }

    let header = ["column", "type", "nullable"].map(str::to_string);
    let body: Vec<Vec<String>> = schema
        .columns
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                c.column_type.to_string(),
                if c.nullable { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    out.push_str(&render_grid(&header, &body));
    out
}

fn row_cells(row: &Row, columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .map(|c| truncate(format_value(row.get(c))))
        .collect()
}

fn truncate(cell: String) -> String {
    if cell.chars().count() <= MAX_CELL_WIDTH {
        return cell;
    }
    let mut cut: String = cell.chars().take(MAX_CELL_WIDTH - 1).collect();
    cut.push('…');
    cut
}

fn render_grid(header: &[String], body: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in body {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:<w$}"))
            .collect();
        format!("| {} |\n", padded.join(" | "))
    };
    let rule = format!(
        "+{}+\n",
        widths
            .iter()
            .map(|&w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+")
    );

    let mut out = rule.clone();
    out.push_str(&line(header));
    out.push_str(&rule);
    for row in body {
        out.push_str(&line(row));
    }
    out.push_str(&rule);
    out
}
