//! AACT MCP Server
//!
//! Serves read-only AACT clinical trials queries over stdio.

use aact_mcp::AactMcpServer;

mcp_common::serve_stdio!(AactMcpServer, "aact_mcp");
