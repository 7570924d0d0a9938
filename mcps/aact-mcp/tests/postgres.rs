//! Integration tests against a live AACT database
//!
//! These tests use the regular configuration sources (`AACT_CONFIG_PATH`,
//! `DB_USER`, `DB_PASSWORD`, ...). Without credentials, or when the database
//! cannot be reached, they print a notice and return early.

use aact_mcp::config::SslMode;
use aact_mcp::{AactConfig, GatewayError, QueryGateway};
use std::sync::Arc;

/// Gateway for the configured AACT database, if one is reachable
async fn live_gateway() -> Option<Arc<QueryGateway>> {
    let config = match AactConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Skipping test: invalid configuration - {}", e);
            return None;
        }
    };

    if config.database.user.is_none() || config.database.password.is_none() {
        eprintln!("Skipping test: DB_USER / DB_PASSWORD not set");
        return None;
    }

    let gateway = QueryGateway::postgres(&config);
    match gateway.list_tables().await {
        Ok(_) => Some(gateway),
        Err(e) => {
            eprintln!(
                "Skipping test: Database not available at {}:{} - {}",
                config.database.host, config.database.port, e
            );
            None
        }
    }
}

#[tokio::test]
async fn test_unreachable_server_is_connection_error() {
    let mut config = AactConfig::default();
    config.database.host = "127.0.0.1".to_string();
    config.database.port = 1;
    config.database.ssl_mode = SslMode::Disable;
    config.database.user = Some("nobody".to_string());
    config.database.password = Some("nothing".to_string());
    config.database.connect_timeout_secs = 2;

    let gateway = QueryGateway::postgres(&config);
    let err = gateway.list_tables().await.unwrap_err();

    assert!(
        matches!(err, GatewayError::Connection(_) | GatewayError::Timeout(_)),
        "unexpected error: {:?}",
        err
    );
}

#[tokio::test]
async fn test_list_and_describe_studies() {
    let Some(gateway) = live_gateway().await else {
        return;
    };

    let tables = gateway.list_tables().await.unwrap();
    assert!(tables.iter().any(|t| t == "studies"));
    assert!(tables.windows(2).all(|w| w[0] <= w[1]), "tables must be sorted");

    let columns = gateway.describe_table("studies").await.unwrap();
    assert!(columns.iter().any(|c| c.column_name == "nct_id"));

    let err = gateway.describe_table("no_such_table").await.unwrap_err();
    assert_eq!(err.kind(), "NotFoundError");
}

#[tokio::test]
async fn test_select_single_study() {
    let Some(gateway) = live_gateway().await else {
        return;
    };

    let result = gateway
        .run_query("SELECT nct_id FROM ctgov.studies LIMIT 1", None)
        .await
        .unwrap();

    assert_eq!(result.columns, ["nct_id"]);
    assert_eq!(result.row_count, 1);
    let nct_id = result.rows[0]["nct_id"].as_str().unwrap();
    assert!(nct_id.starts_with("NCT"));
}

#[tokio::test]
async fn test_row_limit_truncates() {
    let Some(gateway) = live_gateway().await else {
        return;
    };

    let result = gateway
        .run_query("SELECT nct_id FROM ctgov.studies LIMIT 10", Some(3))
        .await
        .unwrap();

    assert_eq!(result.row_count, 3);
    assert!(result.truncated);
}

#[tokio::test]
async fn test_unknown_column_is_execution_error() {
    let Some(gateway) = live_gateway().await else {
        return;
    };

    let err = gateway
        .run_query("SELECT not_a_column FROM ctgov.studies", None)
        .await
        .unwrap_err();

    match err {
        GatewayError::QueryExecution(message) => assert!(message.contains("not_a_column")),
        other => panic!("Expected QueryExecution, got {:?}", other),
    }

    // The session survives an execution error
    gateway.list_tables().await.unwrap();
}

#[tokio::test]
async fn test_side_effects_blocked_by_read_only_session() {
    let Some(gateway) = live_gateway().await else {
        return;
    };

    let err = gateway
        .run_query("SELECT nextval('ctgov.studies_id_seq')", None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "QueryExecutionError");
}

#[tokio::test]
async fn test_driver_side_error_is_not_retried() {
    let Some(gateway) = live_gateway().await else {
        return;
    };

    let err = gateway.run_query("SELECT $1", None).await.unwrap_err();
    assert_eq!(err.kind(), "QueryExecutionError", "unexpected: {:?}", err);
}

#[tokio::test]
async fn test_large_numeric_keeps_its_value() {
    let Some(gateway) = live_gateway().await else {
        return;
    };

    let result = gateway
        .run_query("SELECT 1e30::numeric AS n", None)
        .await
        .unwrap();
    assert_eq!(result.rows[0]["n"], format!("1{}", "0".repeat(30)));
}
