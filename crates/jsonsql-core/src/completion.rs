//! Editor completion items derived from a [`Schema`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::flatten::escape_column_name;
use crate::schema::Schema;

/// Keyword suggestions offered after the table and its columns, in this order.
pub const SQL_KEYWORDS: &[&str] = &[
    "SELECT",
    "FROM",
    "WHERE",
    "GROUP BY",
    "HAVING",
    "ORDER BY",
    "LIMIT",
    "OFFSET",
    "AS",
    "AND",
    "OR",
    "NOT",
    "IN",
    "BETWEEN",
    "LIKE",
    "IS NULL",
    "IS NOT NULL",
    "COUNT",
    "SUM",
    "AVG",
    "MIN",
    "MAX",
    "DISTINCT",
    "JOIN",
    "LEFT JOIN",
    "RIGHT JOIN",
    "INNER JOIN",
    "ON",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionKind {
    Table,
    Field,
    Keyword,
}

impl CompletionKind {
    /// `monaco.languages.CompletionItemKind` code (Struct / Field / Keyword).
    pub fn monaco_code(self) -> u32 {
        match self {
            CompletionKind::Table => 15,
            CompletionKind::Field => 10,
            CompletionKind::Keyword => 14,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionKind,
    pub insert_text: String,
    pub detail: String,
}

impl CompletionItem {
    /// The item in the shape Monaco's `provideCompletionItems` expects.
    pub fn to_monaco(&self) -> Value {
        json!({
            "label": self.label,
            "kind": self.kind.monaco_code(),
            "insertText": self.insert_text,
            "detail": self.detail,
        })
    }
}

/// Table item, one item per column, then [`SQL_KEYWORDS`].
pub fn generate_completion_items(schema: &Schema) -> Vec<CompletionItem> {
    let mut items = Vec::with_capacity(1 + schema.columns.len() + SQL_KEYWORDS.len());

    items.push(CompletionItem {
        label: schema.table_name.clone(),
        kind: CompletionKind::Table,
        insert_text: schema.table_name.clone(),
        detail: "Table".to_string(),
    });

    items.extend(schema.columns.iter().map(|column| CompletionItem {
        label: column.name.clone(),
        kind: CompletionKind::Field,
        insert_text: escape_column_name(&column.name).into_owned(),
        detail: column.detail(),
    }));

    items.extend(SQL_KEYWORDS.iter().map(|keyword| CompletionItem {
        label: keyword.to_string(),
        kind: CompletionKind::Keyword,
        insert_text: keyword.to_string(),
        detail: "SQL Keyword".to_string(),
    }));

    items
}
