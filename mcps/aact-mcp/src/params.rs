//! Parameter definitions for aact-mcp tools

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DescribeTableParams {
    #[schemars(description = "Name of the table in the ctgov schema (e.g., 'studies', 'conditions')")]
    pub table_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReadQueryParams {
    #[schemars(description = "The SQL query to execute. Must be a single SELECT statement (optionally with a WITH clause).")]
    pub query: String,

    #[schemars(description = "Maximum number of rows to return (default: 25). Increase this value if you need more data.")]
    #[serde(default)]
    pub max_rows: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AppendInsightParams {
    #[schemars(description = "The finding to record, as a single self-contained statement")]
    pub finding: String,
}
