//! Error handling utilities for MCP servers
//!
//! Domain errors carry a machine-readable `kind` in the MCP error's `data`
//! object so clients can branch on it without parsing messages.

use rmcp::ErrorData as McpError;
use serde_json::json;

/// Type alias for MCP tool results
pub type McpResult<T> = Result<T, McpError>;

/// Trait for converting errors into MCP-compatible errors
///
/// Implement this for a server's domain error so tools can use `?`.
///
/// ```rust,ignore
/// impl IntoMcpError for GatewayError {
///     fn into_mcp_error(self) -> McpError {
///         mcp_common::kinded_error(self.kind(), self.to_string(), false)
///     }
/// }
///
/// impl From<GatewayError> for McpError {
///     fn from(e: GatewayError) -> Self {
///         e.into_mcp_error()
///     }
/// }
/// ```
pub trait IntoMcpError {
    fn into_mcp_error(self) -> McpError;
}

impl IntoMcpError for serde_json::Error {
    fn into_mcp_error(self) -> McpError {
        kinded_error("SerializationError", format!("JSON error: {}", self), false)
    }
}

impl IntoMcpError for anyhow::Error {
    fn into_mcp_error(self) -> McpError {
        McpError::internal_error(self.to_string(), None)
    }
}

/// Extension trait for Result types to convert to MCP errors
///
/// ```rust,ignore
/// let text = serde_json::to_string_pretty(&snapshot).to_mcp_err()?;
/// ```
pub trait ResultExt<T> {
    fn to_mcp_err(self) -> Result<T, McpError>;
}

impl<T, E: IntoMcpError> ResultExt<T> for Result<T, E> {
    fn to_mcp_err(self) -> Result<T, McpError> {
        self.map_err(|e| e.into_mcp_error())
    }
}

/// Build an MCP error tagged with `{"kind": kind}`
///
/// Caller mistakes (`caller_fault = true`) map to `invalid_params`,
/// everything else to `internal_error`.
pub fn kinded_error(kind: &str, message: impl Into<String>, caller_fault: bool) -> McpError {
    let data = Some(json!({ "kind": kind }));
    let message = message.into();
    if caller_fault {
        McpError::invalid_params(message, data)
    } else {
        McpError::internal_error(message, data)
    }
}

/// The `kind` tag of an MCP error, if it carries one
pub fn error_kind(err: &McpError) -> Option<&str> {
    err.data.as_ref()?.get("kind")?.as_str()
}
