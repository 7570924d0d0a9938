//! Embeddable MCP trait for in-process execution
//!
//! Lets a host call a server's tools directly, without a stdio transport.
//!
//! ```rust,ignore
//! use mcp_common::EmbeddableMcp;
//!
//! let server = AactMcpServer::new();
//! let names: Vec<_> = server.list_tools().into_iter().map(|t| t.name).collect();
//! let result = server.call_tool("list_tables", serde_json::json!({})).await?;
//! ```

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Tool};
use rmcp::ErrorData;
use serde_json::Value;

/// Error type for embeddable MCP operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddableError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Parameters did not deserialize into the tool's parameter type
    #[error("invalid parameters: {0}")]
    InvalidParams(#[from] serde_json::Error),

    /// The tool ran and failed; the original MCP error is kept intact
    #[error("mcp error: {}", .0.message)]
    McpError(ErrorData),
}

impl From<ErrorData> for EmbeddableError {
    fn from(err: ErrorData) -> Self {
        EmbeddableError::McpError(err)
    }
}

impl EmbeddableError {
    /// The `kind` tag of the underlying MCP error, if any
    pub fn kind(&self) -> Option<&str> {
        match self {
            EmbeddableError::McpError(err) => crate::error::error_kind(err),
            _ => None,
        }
    }
}

/// Result type for embeddable MCP operations
pub type EmbeddableResult<T> = Result<T, EmbeddableError>;

/// Trait for MCP servers that can be executed in-process
///
/// Implementations must be `Send + Sync`; tool calls may arrive from
/// several tasks at once.
///
/// Servers built with `#[tool_router]` list tools through their router and
/// dispatch `call_tool` by name:
///
/// ```rust,ignore
/// #[async_trait]
/// impl EmbeddableMcp for AactMcpServer {
///     fn server_name(&self) -> &str {
///         "aact"
///     }
///
///     fn list_tools(&self) -> Vec<Tool> {
///         self.tool_router.list_all()
///     }
///
///     async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult> {
///         match name {
///             "list_tables" => self.list_tables().await.map_err(Into::into),
///             _ => Err(EmbeddableError::ToolNotFound(name.to_string())),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait EmbeddableMcp: Send + Sync {
    /// Server name, matching the name used in MCP configuration files
    fn server_name(&self) -> &str;

    fn list_tools(&self) -> Vec<Tool>;

    /// Executes a tool by name with a JSON object of parameters
    async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult>;

    fn server_description(&self) -> Option<&str> {
        None
    }

    fn server_version(&self) -> Option<&str> {
        None
    }
}
