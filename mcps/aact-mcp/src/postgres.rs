//! PostgreSQL session
//!
//! Concrete [`Connector`]/[`Session`] pair using tokio-postgres.

use async_trait::async_trait;
use futures::{pin_mut, TryStreamExt};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::{Client, NoTls, Row};

use crate::config::{DatabaseConfig, SslMode};
use crate::connection::{Connector, Session};
use crate::error::{GatewayError, GatewayResult};
use crate::types::{ColumnInfo, QueryResult};

const LIST_TABLES_SQL: &str = "SELECT table_name::text \
     FROM information_schema.tables \
     WHERE table_schema = $1::text \
     ORDER BY table_name";

const DESCRIBE_TABLE_SQL: &str = "SELECT column_name::text, data_type::text, \
            character_maximum_length::integer, (is_nullable = 'YES') \
     FROM information_schema.columns \
     WHERE table_schema = $1::text AND table_name = $2::text \
     ORDER BY ordinal_position";

const TABLE_EXISTS_SQL: &str = "SELECT EXISTS ( \
         SELECT 1 FROM information_schema.tables \
         WHERE table_schema = $1::text AND table_name = $2::text)";

const SCHEMA_SNAPSHOT_SQL: &str = "SELECT table_name::text, column_name::text, data_type::text, \
            character_maximum_length::integer, (is_nullable = 'YES') \
     FROM information_schema.columns \
     WHERE table_schema = $1::text \
     ORDER BY table_name, ordinal_position";

/// Opens tokio-postgres sessions from a [`DatabaseConfig`]
pub struct PostgresConnector {
    config: DatabaseConfig,
}

impl PostgresConnector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    fn pg_config(&self) -> tokio_postgres::Config {
        let db = &self.config;
        let mut pg = tokio_postgres::Config::new();
        pg.host(&db.host)
            .port(db.port)
            .dbname(&db.dbname)
            .application_name("aact-mcp")
            .connect_timeout(db.connect_timeout())
            .ssl_mode(match db.ssl_mode {
                SslMode::Disable => tokio_postgres::config::SslMode::Disable,
                SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
                SslMode::Require => tokio_postgres::config::SslMode::Require,
            });

        if let Some(user) = &db.user {
            pg.user(user);
        }
        if let Some(password) = &db.password {
            pg.password(password);
        }

        pg
    }

    /// Statements run once on every new session
    fn session_setup(&self) -> String {
        let timeout_ms = self.config.query_timeout().as_millis();
        let mut setup = format!("SET statement_timeout = {}", timeout_ms);
        if self.config.read_only_session {
            setup.push_str("; SET SESSION CHARACTERISTICS AS TRANSACTION READ ONLY");
        }
        setup
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    async fn connect(&self) -> GatewayResult<Box<dyn Session>> {
        let pg = self.pg_config();
        let connect_err = |e: tokio_postgres::Error| GatewayError::Connection(e.to_string());

        let (client, driver) = match self.config.ssl_mode {
            SslMode::Disable => {
                let (client, connection) = pg.connect(NoTls).await.map_err(connect_err)?;
                (client, spawn_driver(connection))
            }
            SslMode::Prefer | SslMode::Require => {
                let tls = tokio_postgres_rustls::MakeRustlsConnect::new(make_tls_config());
                let (client, connection) = pg.connect(tls).await.map_err(connect_err)?;
                (client, spawn_driver(connection))
            }
        };

        client
            .batch_execute(&self.session_setup())
            .await
            .map_err(|e| GatewayError::Connection(format!("Failed to prepare session: {}", e)))?;

        Ok(Box::new(PostgresSession {
            client,
            driver,
            namespace: self.config.namespace.clone(),
            statement_timeout: self.config.query_timeout(),
        }))
    }

    fn target(&self) -> String {
        format!(
            "{}:{}/{}",
            self.config.host, self.config.port, self.config.dbname
        )
    }
}

/// tokio-postgres needs its connection future polled on a task of its own.
fn spawn_driver<F>(connection: F) -> JoinHandle<()>
where
    F: std::future::Future<Output = Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::warn!(error = %e, "Database connection lost");
        }
    })
}

/// Build a rustls ClientConfig that trusts OS certificates (with Mozilla roots as fallback)
fn make_tls_config() -> rustls::ClientConfig {
    let mut root_store = rustls::RootCertStore::empty();

    let native_certs = rustls_native_certs::load_native_certs();
    let mut loaded = 0;
    for cert in native_certs.certs {
        if root_store.add(cert).is_ok() {
            loaded += 1;
        }
    }
    if loaded == 0 {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// A live tokio-postgres session scoped to one namespace
pub struct PostgresSession {
    client: Client,
    driver: JoinHandle<()>,
    namespace: String,
    statement_timeout: Duration,
}

impl Drop for PostgresSession {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

#[async_trait]
impl Session for PostgresSession {
    async fn list_tables(&mut self) -> GatewayResult<Vec<String>> {
        let rows = self.client.query(LIST_TABLES_SQL, &[&self.namespace]).await?;
        rows.iter().map(|row| column(row, 0)).collect()
    }

    async fn describe_table(&mut self, table: String) -> GatewayResult<Option<Vec<ColumnInfo>>> {
        let rows = self
            .client
            .query(DESCRIBE_TABLE_SQL, &[&self.namespace, &table])
            .await?;

        if rows.is_empty() {
            // No columns: either a zero-column table or no table at all
            let exists: bool = column(
                &self
                    .client
                    .query_one(TABLE_EXISTS_SQL, &[&self.namespace, &table])
                    .await?,
                0,
            )?;
            return Ok(exists.then(Vec::new));
        }

        rows.iter()
            .map(|row| column_info(row, 0))
            .collect::<GatewayResult<Vec<_>>>()
            .map(Some)
    }

    async fn schema_snapshot(&mut self) -> GatewayResult<BTreeMap<String, Vec<ColumnInfo>>> {
        let rows = self
            .client
            .query(SCHEMA_SNAPSHOT_SQL, &[&self.namespace])
            .await?;

        let mut tables: BTreeMap<String, Vec<ColumnInfo>> = BTreeMap::new();
        for row in &rows {
            let table: String = column(row, 0)?;
            tables.entry(table).or_default().push(column_info(row, 1)?);
        }

        Ok(tables)
    }

    async fn query(&mut self, sql: String, max_rows: usize) -> GatewayResult<QueryResult> {
        let timeout = self.statement_timeout;
        let driver_err = move |e: tokio_postgres::Error| driver_error(e, timeout);

        let stmt = self.client.prepare(&sql).await.map_err(driver_err)?;
        let columns: Vec<String> = stmt
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();

        let stream = self
            .client
            .query_raw(&stmt, std::iter::empty::<String>())
            .await
            .map_err(driver_err)?;
        pin_mut!(stream);

        // Stop reading once the limit is passed; the driver discards the rest.
        let mut rows = Vec::new();
        let mut truncated = false;
        while let Some(row) = stream.try_next().await.map_err(driver_err)? {
            if rows.len() == max_rows {
                truncated = true;
                break;
            }
            rows.push(shape_row(&row, &columns));
        }

        Ok(QueryResult::new(columns, rows, truncated))
    }

    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

/// Server-side `statement_timeout` cancellations surface as timeouts
fn driver_error(err: tokio_postgres::Error, statement_timeout: Duration) -> GatewayError {
    if is_statement_timeout(err.code()) {
        return GatewayError::Timeout(statement_timeout);
    }
    GatewayError::from(err)
}

fn is_statement_timeout(code: Option<&SqlState>) -> bool {
    code == Some(&SqlState::QUERY_CANCELED)
}

/// Read a typed column, treating a type mismatch as an execution error
fn column<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> GatewayResult<T> {
    row.try_get(idx)
        .map_err(|e| GatewayError::QueryExecution(format!("Unexpected column type: {}", e)))
}

/// Decode `(column_name, data_type, character_maximum_length, is_nullable)` starting at `first`
fn column_info(row: &Row, first: usize) -> GatewayResult<ColumnInfo> {
    Ok(ColumnInfo {
        column_name: column(row, first)?,
        data_type: column(row, first + 1)?,
        character_maximum_length: column(row, first + 2)?,
        is_nullable: column::<Option<bool>>(row, first + 3)?.unwrap_or(true),
    })
}

fn shape_row(row: &Row, columns: &[String]) -> serde_json::Map<String, Value> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.clone(), cell_to_json(row, idx)))
        .collect()
}

/// Convert one cell to JSON based on the column's Postgres type.
///
/// Types without a natural JSON form fall back to their text representation.
fn cell_to_json(row: &Row, idx: usize) -> Value {
    let ty = row.columns()[idx].type_().clone();

    match ty {
        Type::BOOL => typed(row, idx, Value::Bool),
        Type::INT2 => typed(row, idx, |v: i16| json!(v)),
        Type::INT4 => typed(row, idx, |v: i32| json!(v)),
        Type::INT8 => typed(row, idx, |v: i64| json!(v)),
        Type::FLOAT4 => typed(row, idx, |v: f32| json!(v)),
        Type::FLOAT8 => typed(row, idx, |v: f64| json!(v)),
        // Keep full precision; values beyond Decimal's range are decoded from the wire form
        Type::NUMERIC => match row.try_get::<_, Option<Decimal>>(idx) {
            Ok(Some(v)) => Value::String(v.to_string()),
            Ok(None) => Value::Null,
            Err(_) => typed(row, idx, |v: NumericText| Value::String(v.0)),
        },
        Type::JSON | Type::JSONB => typed(row, idx, |v: Value| v),
        Type::UUID => typed(row, idx, |v: uuid::Uuid| Value::String(v.to_string())),
        Type::DATE => typed(row, idx, |v: chrono::NaiveDate| Value::String(v.to_string())),
        Type::TIME => typed(row, idx, |v: chrono::NaiveTime| Value::String(v.to_string())),
        Type::TIMESTAMP => {
            typed(row, idx, |v: chrono::NaiveDateTime| Value::String(v.to_string()))
        }
        Type::TIMESTAMPTZ => typed(row, idx, |v: chrono::DateTime<chrono::Utc>| {
            Value::String(v.to_rfc3339())
        }),
        Type::BYTEA => typed(row, idx, |v: Vec<u8>| {
            Value::String(format!("<bytea {} bytes>", v.len()))
        }),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::BPCHAR_ARRAY | Type::NAME_ARRAY => {
            typed(row, idx, |v: Vec<Option<String>>| json!(v))
        }
        Type::INT2_ARRAY => typed(row, idx, |v: Vec<Option<i16>>| json!(v)),
        Type::INT4_ARRAY => typed(row, idx, |v: Vec<Option<i32>>| json!(v)),
        Type::INT8_ARRAY => typed(row, idx, |v: Vec<Option<i64>>| json!(v)),
        Type::FLOAT8_ARRAY => typed(row, idx, |v: Vec<Option<f64>>| json!(v)),
        Type::BOOL_ARRAY => typed(row, idx, |v: Vec<Option<bool>>| json!(v)),
        _ => as_string(row, idx),
    }
}

fn typed<'a, T, F>(row: &'a Row, idx: usize, convert: F) -> Value
where
    T: FromSql<'a>,
    F: FnOnce(T) -> Value,
{
    match row.try_get::<_, Option<T>>(idx) {
        Ok(Some(v)) => convert(v),
        Ok(None) => Value::Null,
        Err(_) => as_string(row, idx),
    }
}

/// `numeric` rendered as decimal text straight from the binary wire format
struct NumericText(String);

impl<'a> FromSql<'a> for NumericText {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        decode_numeric(raw).map(NumericText)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Header is `ndigits, weight, sign, dscale` (16 bits each), followed by
/// `ndigits` base-10000 digits. `weight` is the power of 10000 of the first digit.
fn decode_numeric(raw: &[u8]) -> Result<String, Box<dyn std::error::Error + Sync + Send>> {
    let word = |i: usize| -> Result<u16, Box<dyn std::error::Error + Sync + Send>> {
        raw.get(i * 2..i * 2 + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated numeric value".into())
    };

    let ndigits = usize::from(word(0)?);
    let weight = i32::from(word(1)? as i16);
    let sign = word(2)?;
    let dscale = usize::from(word(3)?);

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        _ => {}
    }

    let digits = (0..ndigits)
        .map(|i| word(4 + i))
        .collect::<Result<Vec<u16>, _>>()?;
    let digit = |idx: i32| -> u16 {
        usize::try_from(idx)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut text = String::new();
    if sign == NUMERIC_NEG {
        text.push('-');
    }

    if weight < 0 {
        text.push('0');
    } else {
        text.push_str(&digit(0).to_string());
        for idx in 1..=weight {
            text.push_str(&format!("{:04}", digit(idx)));
        }
    }

    if dscale > 0 {
        let mut fraction = String::new();
        let mut idx = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", digit(idx)));
            idx += 1;
        }
        fraction.truncate(dscale);
        text.push('.');
        text.push_str(&fraction);
    }

    Ok(text)
}

/// Fallback for text-like and unmapped types
fn as_string(row: &Row, idx: usize) -> Value {
    match row.try_get::<_, Option<String>>(idx) {
        Ok(Some(v)) => Value::String(v),
        Ok(None) => Value::Null,
        Err(_) => {
            let type_name = row
                .columns()
                .get(idx)
                .map_or("unknown", |c| c.type_().name());
            Value::String(format!("<unsupported type: {}>", type_name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector(read_only: bool) -> PostgresConnector {
        let config = DatabaseConfig {
            user: Some("analyst".to_string()),
            password: Some("secret".to_string()),
            query_timeout_secs: 5,
            read_only_session: read_only,
            ..Default::default()
        };
        PostgresConnector::new(config)
    }

    #[test]
    fn test_session_setup_read_only() {
        let setup = connector(true).session_setup();
        assert_eq!(
            setup,
            "SET statement_timeout = 5000; SET SESSION CHARACTERISTICS AS TRANSACTION READ ONLY"
        );
    }

    #[test]
    fn test_session_setup_without_read_only() {
        assert_eq!(connector(false).session_setup(), "SET statement_timeout = 5000");
    }

    fn numeric_bytes(weight: i16, sign: u16, dscale: u16, digits: &[u16]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(digits.len() as u16).to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&dscale.to_be_bytes());
        for digit in digits {
            raw.extend_from_slice(&digit.to_be_bytes());
        }
        raw
    }

    #[test]
    fn test_numeric_beyond_decimal_range_keeps_value() {
        // 1e30 = 100 * 10000^7
        let raw = numeric_bytes(7, 0, 0, &[100]);
        let expected = format!("1{}", "0".repeat(30));
        assert_eq!(decode_numeric(&raw).unwrap(), expected);

        let value = NumericText::from_sql(&Type::NUMERIC, &raw).unwrap();
        assert_eq!(value.0, expected);
    }

    #[test]
    fn test_numeric_fractions_and_sign() {
        assert_eq!(decode_numeric(&numeric_bytes(0, NUMERIC_NEG, 1, &[12, 5000])).unwrap(), "-12.5");
        assert_eq!(decode_numeric(&numeric_bytes(-1, 0, 5, &[1, 2000])).unwrap(), "0.00012");
        assert_eq!(decode_numeric(&numeric_bytes(1, 0, 2, &[1, 0])).unwrap(), "10000.00");
        assert_eq!(decode_numeric(&numeric_bytes(0, 0, 0, &[])).unwrap(), "0");
    }

    #[test]
    fn test_numeric_special_values() {
        assert_eq!(decode_numeric(&numeric_bytes(0, NUMERIC_NAN, 0, &[])).unwrap(), "NaN");
        assert_eq!(decode_numeric(&numeric_bytes(0, NUMERIC_NINF, 0, &[])).unwrap(), "-Infinity");
        assert!(decode_numeric(&[0, 1]).is_err());
    }

    #[test]
    fn test_query_canceled_is_statement_timeout() {
        assert!(is_statement_timeout(Some(&SqlState::QUERY_CANCELED)));
        assert!(!is_statement_timeout(Some(&SqlState::UNDEFINED_COLUMN)));
        assert!(!is_statement_timeout(None));
    }

    #[test]
    fn test_target_hides_credentials() {
        let target = connector(true).target();
        assert_eq!(target, "aact-db.ctti-clinicaltrials.org:5432/aact");
        assert!(!target.contains("secret"));
    }

    #[test]
    fn test_pg_config_carries_settings() {
        let pg = connector(true).pg_config();
        assert_eq!(pg.get_user(), Some("analyst"));
        assert_eq!(pg.get_dbname(), Some("aact"));
        assert_eq!(pg.get_ports(), &[5432]);
    }
}
