//! MCP Common - Shared utilities for MCP servers
//!
//! - **Initialization**: `serve_stdio!` macro and stderr tracing setup
//! - **Results**: [`json_success`] for structured tool responses
//! - **Errors**: [`IntoMcpError`] and `kind`-tagged MCP errors
//! - **Embeddable**: [`EmbeddableMcp`] trait for in-process execution
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_common::{serve_stdio, json_success};
//!
//! // main.rs
//! serve_stdio!(AactMcpServer, "aact_mcp");
//!
//! // a tool
//! async fn list_tables(&self) -> Result<CallToolResult, McpError> {
//!     json_success(&self.gateway.list_tables().await?)
//! }
//! ```

pub mod embeddable;
pub mod error;
pub mod init;
pub mod result;

pub use embeddable::{EmbeddableError, EmbeddableMcp, EmbeddableResult};
pub use error::{error_kind, kinded_error, IntoMcpError, McpResult, ResultExt};
pub use init::init_tracing;
pub use result::{first_text, json_success};

pub use rmcp::{
    model::{CallToolResult, Content, Tool},
    ErrorData as McpError,
};

pub use async_trait::async_trait;
