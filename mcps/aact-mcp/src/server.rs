//! AACT MCP Server implementation
//!
//! Exposes the query gateway as MCP tools, plus two resources: the live
//! schema snapshot and the insight memo.

use mcp_common::{
    async_trait, json_success, EmbeddableError, EmbeddableMcp, EmbeddableResult, McpError, ResultExt,
    Tool,
};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        AnnotateAble, CallToolResult, ListResourcesResult, PaginatedRequestParam, RawResource,
        ReadResourceRequestParam, ReadResourceResult, Resource, ResourceContents,
        ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router, RoleServer,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::AactConfig;
use crate::gateway::QueryGateway;
use crate::params::*;
use crate::types::{InsightResponse, TableInfo};

pub const SCHEMA_URI: &str = "schema://database";
pub const MEMO_URI: &str = "memo://insights";

const INSTRUCTIONS: &str = "You are an MCP server providing access to the AACT (Aggregate Analysis of \
ClinicalTrials.gov) database.

This server enables querying and analysis of clinical trial data from ClinicalTrials.gov.
Use the available tools to:
1. First explore the database structure with list_tables
2. Examine specific tables with describe_table
3. Query data using read_query (SELECT statements only)
4. Record important findings with append_insight

The database contains comprehensive clinical trial information including studies, outcomes, \
interventions, sponsors, and more. Always validate table and column names before querying.

CRITICAL: If you use this tool, your answer MUST be based on data received from the AACT database \
exclusively. Do not add other data from your own knowledge or make any assumptions. \
Everything must be grounded in the data received from the tool.";

/// AACT MCP Server
#[derive(Clone)]
pub struct AactMcpServer {
    gateway: Arc<QueryGateway>,
    tool_router: ToolRouter<Self>,
}

impl AactMcpServer {
    /// Create a server connected (lazily) to the configured database
    pub fn new() -> Self {
        let config = AactConfig::load_or_default();

        if config.database.user.is_none() || config.database.password.is_none() {
            tracing::warn!("DB_USER or DB_PASSWORD not set; connections will likely be rejected");
        }
        tracing::debug!(config = ?config.database, "Loaded database config");

        Self::with_gateway(QueryGateway::postgres(&config))
    }

    /// Create a server around an existing gateway
    pub fn with_gateway(gateway: Arc<QueryGateway>) -> Self {
        Self {
            gateway,
            tool_router: Self::tool_router(),
        }
    }

    fn resource(uri: &str, name: &str, description: &str, mime_type: &str) -> Resource {
        let mut raw = RawResource::new(uri, name.to_string());
        raw.description = Some(description.to_string());
        raw.mime_type = Some(mime_type.to_string());
        raw.no_annotation()
    }
}

impl Default for AactMcpServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_router]
impl AactMcpServer {
    #[tool(description = "Get an overview of all available tables in the AACT database. \
        This tool helps you understand the database structure before starting your analysis \
        to identify relevant data sources.")]
    async fn list_tables(&self) -> Result<CallToolResult, McpError> {
        let tables: Vec<TableInfo> = self
            .gateway
            .list_tables()
            .await?
            .into_iter()
            .map(|table_name| TableInfo { table_name })
            .collect();

        json_success(&tables)
    }

    #[tool(description = "Examine the detailed structure of a specific AACT table, including column \
        names and data types. Use this before querying to ensure you target the right columns and \
        understand the data format.")]
    async fn describe_table(
        &self,
        Parameters(params): Parameters<DescribeTableParams>,
    ) -> Result<CallToolResult, McpError> {
        let columns = self.gateway.describe_table(&params.table_name).await?;
        json_success(&columns)
    }

    #[tool(description = "Execute a SELECT query on the AACT clinical trials database. Use this tool \
        to extract and analyze specific data from any table. Only a single SELECT statement \
        (optionally behind a WITH clause) is accepted. Returns at most max_rows rows (default 25); \
        'truncated' tells you whether more rows were available.")]
    async fn read_query(
        &self,
        Parameters(params): Parameters<ReadQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.gateway.run_query(&params.query, params.max_rows).await?;
        json_success(&result)
    }

    #[tool(description = "Record key findings and insights discovered during your analysis. Use this \
        tool whenever you uncover meaningful patterns, trends, or notable observations about \
        clinical trials. Findings are collected in the memo://insights resource.")]
    async fn append_insight(
        &self,
        Parameters(params): Parameters<AppendInsightParams>,
    ) -> Result<CallToolResult, McpError> {
        let total_insights = self.gateway.append_insight(&params.finding).await?;

        json_success(&InsightResponse {
            success: true,
            total_insights,
            message: "Insight added successfully".to_string(),
        })
    }
}

#[tool_handler]
impl rmcp::ServerHandler for AactMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult::with_all_items(vec![
            Self::resource(
                SCHEMA_URI,
                "AACT database schema",
                "All tables in the ctgov schema with their columns",
                "application/json",
            ),
            Self::resource(
                MEMO_URI,
                "Insights memo",
                "Findings recorded with append_insight during this session",
                "text/plain",
            ),
        ]))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let text = match request.uri.as_str() {
            SCHEMA_URI => {
                let snapshot = self.gateway.schema_snapshot().await?;
                serde_json::to_string_pretty(&snapshot).to_mcp_err()?
            }
            MEMO_URI => self.gateway.render_memo().await,
            other => {
                return Err(McpError::resource_not_found(
                    format!("Unknown resource: {}", other),
                    Some(json!({ "uri": other })),
                ))
            }
        };

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, request.uri)],
        })
    }
}

// ============================================================================
// EmbeddableMcp Implementation
// ============================================================================

#[async_trait]
impl EmbeddableMcp for AactMcpServer {
    fn server_name(&self) -> &str {
        "aact"
    }

    fn server_description(&self) -> Option<&str> {
        Some("Read-only access to the AACT clinical trials database with an insights memo")
    }

    fn list_tools(&self) -> Vec<Tool> {
        self.tool_router.list_all()
    }

    async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult> {
        match name {
            "list_tables" => self.list_tables().await.map_err(Into::into),

            "describe_table" => {
                let params: DescribeTableParams = serde_json::from_value(params)?;
                self.describe_table(Parameters(params)).await.map_err(Into::into)
            }

            "read_query" => {
                let params: ReadQueryParams = serde_json::from_value(params)?;
                self.read_query(Parameters(params)).await.map_err(Into::into)
            }

            "append_insight" => {
                let params: AppendInsightParams = serde_json::from_value(params)?;
                self.append_insight(Parameters(params)).await.map_err(Into::into)
            }

            _ => Err(EmbeddableError::ToolNotFound(name.to_string())),
        }
    }
}
