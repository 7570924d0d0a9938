//! Connection management
//!
//! One lazily-established database session per process, never pooled.
//! The manager owns the session state and the reconnect policy: a
//! connectivity failure gets exactly one reconnect-and-retry, anything else
//! is reported as-is. Callers serialize access by holding the manager behind
//! a mutex for the whole operation.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{GatewayError, GatewayResult};
use crate::types::{ColumnInfo, QueryResult};

/// A live database session
///
/// Implementations translate driver errors so that only genuine
/// connectivity problems come back as [`GatewayError::Connection`].
#[async_trait]
pub trait Session: Send {
    /// Table names in the target namespace, sorted
    async fn list_tables(&mut self) -> GatewayResult<Vec<String>>;

    /// Columns of `table` in ordinal order, or `None` if the table does not exist
    async fn describe_table(&mut self, table: String) -> GatewayResult<Option<Vec<ColumnInfo>>>;

    /// Every table in the namespace with its columns
    async fn schema_snapshot(&mut self) -> GatewayResult<BTreeMap<String, Vec<ColumnInfo>>>;

    /// Run `sql` unchanged, keeping at most `max_rows` rows
    async fn query(&mut self, sql: String, max_rows: usize) -> GatewayResult<QueryResult>;

    /// Whether the underlying connection has gone away
    fn is_closed(&self) -> bool;
}

/// Opens new sessions
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> GatewayResult<Box<dyn Session>>;

    /// Target description for logs (never includes credentials)
    fn target(&self) -> String;
}

/// Connection lifecycle
pub enum ConnectionState {
    Disconnected,
    Connected(Box<dyn Session>),
    Failed(String),
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected(_) => "connected",
            ConnectionState::Failed(_) => "failed",
        }
    }
}

/// Owner of the single database session
pub struct ConnectionManager {
    connector: Box<dyn Connector>,
    state: ConnectionState,
    connect_timeout: Duration,
    query_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(connector: Box<dyn Connector>, connect_timeout: Duration, query_timeout: Duration) -> Self {
        Self {
            connector,
            state: ConnectionState::Disconnected,
            connect_timeout,
            query_timeout,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Return the live session, connecting first if needed
    pub async fn session(&mut self) -> GatewayResult<&mut Box<dyn Session>> {
        let closed = matches!(&self.state, ConnectionState::Connected(session) if session.is_closed());
        if closed {
            tracing::warn!("Cached connection is closed, reconnecting");
            self.state = ConnectionState::Failed("connection closed".to_string());
        }

        if !matches!(self.state, ConnectionState::Connected(_)) {
            tracing::info!(db = %self.connector.target(), "Connecting to database");

            let session = match tokio::time::timeout(self.connect_timeout, self.connector.connect()).await {
                Ok(Ok(session)) => session,
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "Database connection failed");
                    self.state = ConnectionState::Failed(err.to_string());
                    return Err(err);
                }
                Err(_) => {
                    tracing::warn!(timeout = ?self.connect_timeout, "Database connection timed out");
                    self.state = ConnectionState::Failed("connect timed out".to_string());
                    return Err(GatewayError::Timeout(self.connect_timeout));
                }
            };

            tracing::info!("Database connection established");
            self.state = ConnectionState::Connected(session);
        }

        match &mut self.state {
            ConnectionState::Connected(session) => Ok(session),
            _ => Err(GatewayError::Connection("connection unavailable".to_string())),
        }
    }

    /// Drop the current session so the next call reconnects
    pub fn discard(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if matches!(self.state, ConnectionState::Connected(_)) {
            tracing::debug!(reason = %reason, "Discarding database connection");
        }
        self.state = ConnectionState::Failed(reason);
    }

    /// Run an operation against the session with the retry policy applied
    pub async fn run<T, F>(&mut self, mut op: F) -> GatewayResult<T>
    where
        F: for<'s> FnMut(&'s mut Box<dyn Session>) -> BoxFuture<'s, GatewayResult<T>>,
    {
        let mut retried = false;

        loop {
            match self.attempt(&mut op).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_connectivity() => {
                    self.discard(err.to_string());
                    if retried {
                        tracing::warn!(error = %err, "Retry failed, giving up");
                        return Err(err);
                    }
                    tracing::warn!(error = %err, "Connectivity failure, reconnecting once");
                    retried = true;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt<T, F>(&mut self, op: &mut F) -> GatewayResult<T>
    where
        F: for<'s> FnMut(&'s mut Box<dyn Session>) -> BoxFuture<'s, GatewayResult<T>>,
    {
        let query_timeout = self.query_timeout;
        let session = self.session().await?;

        let outcome = tokio::time::timeout(query_timeout, op(session)).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                // The statement may still be running server-side; never reuse this session.
                tracing::warn!(timeout = ?query_timeout, "Statement timed out");
                self.discard("statement timed out");
                Err(GatewayError::Timeout(query_timeout))
            }
        }
    }
}
