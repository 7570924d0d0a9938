//! Error taxonomy for the query gateway
//!
//! Every failure the gateway reports maps to exactly one kind. The MCP layer
//! turns them into `rmcp::ErrorData` with the kind attached as structured data.

use mcp_common::{kinded_error, IntoMcpError, McpError};

/// Errors surfaced by gateway operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Database unreachable or credentials rejected
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Statement blocked before reaching the database
    #[error("Query rejected: {0}")]
    RejectedQuery(String),

    /// Database ran the statement and reported an error (message verbatim)
    #[error("{0}")]
    QueryExecution(String),

    /// Schema object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed caller input
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Bounded wait exceeded
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// Stable kind name reported to callers
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Connection(_) => "ConnectionError",
            GatewayError::RejectedQuery(_) => "RejectedQueryError",
            GatewayError::QueryExecution(_) => "QueryExecutionError",
            GatewayError::NotFound(_) => "NotFoundError",
            GatewayError::Validation(_) => "ValidationError",
            GatewayError::Timeout(_) => "TimeoutError",
        }
    }

    /// Whether a reconnect-and-retry may fix this failure
    pub fn is_connectivity(&self) -> bool {
        matches!(self, GatewayError::Connection(_))
    }
}

impl From<tokio_postgres::Error> for GatewayError {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            return GatewayError::QueryExecution(db_err.message().to_string());
        }

        // Only a dead socket is worth a reconnect. Driver-side failures such as
        // a parameter count mismatch or a row decode error belong to the query.
        let io_failure = std::error::Error::source(&err)
            .is_some_and(|source| source.downcast_ref::<std::io::Error>().is_some());
        if err.is_closed() || io_failure {
            GatewayError::Connection(err.to_string())
        } else {
            GatewayError::QueryExecution(err.to_string())
        }
    }
}

impl IntoMcpError for GatewayError {
    fn into_mcp_error(self) -> McpError {
        let caller_fault = matches!(
            self,
            GatewayError::RejectedQuery(_) | GatewayError::Validation(_) | GatewayError::NotFound(_)
        );
        kinded_error(self.kind(), self.to_string(), caller_fault)
    }
}

impl From<GatewayError> for McpError {
    fn from(err: GatewayError) -> Self {
        err.into_mcp_error()
    }
}
