//! Query gateway
//!
//! The façade the MCP tools call. Validation happens here, before the
//! connection is touched; execution goes through the [`ConnectionManager`]
//! behind a single mutex so no two statements ever share the session at once.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::{AactConfig, QueryConfig};
use crate::connection::{ConnectionManager, Connector};
use crate::error::{GatewayError, GatewayResult};
use crate::memo::InsightMemo;
use crate::postgres::PostgresConnector;
use crate::types::{ColumnInfo, QueryResult, SchemaSnapshot};
use crate::validator;

/// Coordinates validation, execution and result shaping
pub struct QueryGateway {
    connection: Mutex<ConnectionManager>,
    memo: InsightMemo,
    query: QueryConfig,
    database: String,
    namespace: String,
}

impl QueryGateway {
    /// Build a gateway from an explicit connector and memo
    pub fn new(connector: Box<dyn Connector>, memo: InsightMemo, config: &AactConfig) -> Self {
        let db = &config.database;
        Self {
            connection: Mutex::new(ConnectionManager::new(
                connector,
                db.connect_timeout(),
                db.query_timeout(),
            )),
            memo,
            query: config.query.clone(),
            database: db.dbname.clone(),
            namespace: db.namespace.clone(),
        }
    }

    /// Build a gateway talking to PostgreSQL with a fresh memo
    pub fn postgres(config: &AactConfig) -> Arc<Self> {
        let connector = PostgresConnector::new(config.database.clone());
        Arc::new(Self::new(Box::new(connector), InsightMemo::new(), config))
    }

    pub fn memo(&self) -> &InsightMemo {
        &self.memo
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    // ========================================================================
    // Schema Catalog
    // ========================================================================

    /// Sorted table names in the target namespace
    pub async fn list_tables(&self) -> GatewayResult<Vec<String>> {
        let mut conn = self.connection.lock().await;
        let tables = conn.run(|session| session.list_tables()).await?;
        tracing::debug!(count = tables.len(), "Listed tables");
        Ok(tables)
    }

    /// Columns of one table, in ordinal order
    pub async fn describe_table(&self, table: &str) -> GatewayResult<Vec<ColumnInfo>> {
        if table.trim().is_empty() {
            return Err(GatewayError::Validation("table_name must not be empty".to_string()));
        }

        let name = table.to_string();
        let mut conn = self.connection.lock().await;
        let columns = conn
            .run(move |session| session.describe_table(name.clone()))
            .await?;

        match columns {
            Some(columns) => {
                tracing::debug!(table, count = columns.len(), "Described table");
                Ok(columns)
            }
            None => Err(GatewayError::NotFound(format!(
                "Table '{}' does not exist in schema '{}'",
                table, self.namespace
            ))),
        }
    }

    /// Every table with its columns
    pub async fn schema_snapshot(&self) -> GatewayResult<SchemaSnapshot> {
        let mut conn = self.connection.lock().await;
        let tables = conn.run(|session| session.schema_snapshot()).await?;
        Ok(SchemaSnapshot::new(&self.database, &self.namespace, tables))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Validate and execute a read-only statement
    pub async fn run_query(&self, sql: &str, max_rows: Option<usize>) -> GatewayResult<QueryResult> {
        let classification = validator::classify(sql);
        tracing::debug!(classification = ?classification, "Classified query");

        if !classification.is_read_only() {
            tracing::info!(reason = %classification, "Rejected query");
            return Err(GatewayError::RejectedQuery(classification.to_string()));
        }

        let max_rows = self.query.effective_max_rows(max_rows);
        let sql = sql.to_string();

        let mut conn = self.connection.lock().await;
        let result = conn
            .run(move |session| session.query(sql.clone(), max_rows))
            .await;

        match &result {
            Ok(rows) => tracing::info!(
                rows = rows.row_count,
                truncated = rows.truncated,
                "Query succeeded"
            ),
            Err(err) => tracing::warn!(kind = err.kind(), error = %err, "Query failed"),
        }

        result
    }

    // ========================================================================
    // Insight Memo
    // ========================================================================

    /// Record a finding, returning the new total
    pub async fn append_insight(&self, text: &str) -> GatewayResult<usize> {
        if text.trim().is_empty() {
            return Err(GatewayError::Validation("finding must not be empty".to_string()));
        }

        let total = self.memo.append(text.to_string()).await;
        tracing::info!(total, "Insight recorded");
        Ok(total)
    }

    pub async fn render_memo(&self) -> String {
        self.memo.render().await
    }
}
