//! AACT MCP Library
//!
//! Read-only access to the AACT (Aggregate Analysis of ClinicalTrials.gov)
//! PostgreSQL database: schema discovery, validated SELECT queries and an
//! in-memory memo of findings.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use aact_mcp::AactMcpServer;
//! use mcp_common::EmbeddableMcp;
//!
//! let server = AactMcpServer::new();
//! let result = server
//!     .call_tool("read_query", serde_json::json!({ "query": "SELECT 1" }))
//!     .await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod gateway;
pub mod memo;
pub mod params;
pub mod postgres;
pub mod server;
pub mod types;
pub mod validator;


pub use config::AactConfig;
pub use error::{GatewayError, GatewayResult};
pub use gateway::QueryGateway;
pub use memo::InsightMemo;
pub use server::AactMcpServer;

// Re-export parameter types for direct API usage
pub use params::{AppendInsightParams, DescribeTableParams, ReadQueryParams};
