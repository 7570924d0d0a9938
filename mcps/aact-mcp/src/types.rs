//! Response types shared by the gateway and the MCP tools

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A table visible in the target namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub table_name: String,
}

/// Column description as reported by `information_schema.columns`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    pub character_maximum_length: Option<i32>,
    pub is_nullable: bool,
}

/// One result row: column name to value, in projection order
pub type Row = Map<String, Value>;

/// Shaped result of a read-only query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// Column names in projection order
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    /// More rows were available than the row limit allowed
    pub truncated: bool,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Row>, truncated: bool) -> Self {
        Self {
            row_count: rows.len(),
            columns,
            rows,
            truncated,
        }
    }
}

/// Full schema view served as the `schema://database` resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaSnapshot {
    pub schema_version: &'static str,
    pub database: String,
    pub namespace: String,
    pub tables: BTreeMap<String, Vec<ColumnInfo>>,
}

impl SchemaSnapshot {
    pub fn new(
        database: impl Into<String>,
        namespace: impl Into<String>,
        tables: BTreeMap<String, Vec<ColumnInfo>>,
    ) -> Self {
        Self {
            schema_version: "1.0",
            database: database.into(),
            namespace: namespace.into(),
            tables,
        }
    }
}

/// Response for `append_insight`
#[derive(Debug, Clone, Serialize)]
pub struct InsightResponse {
    pub success: bool,
    pub total_insights: usize,
    pub message: String,
}
