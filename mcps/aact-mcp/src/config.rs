//! Configuration for the AACT MCP Server

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// AACT MCP configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AactConfig {
    /// Database connection settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Query result shaping
    #[serde(default)]
    pub query: QueryConfig,
}

/// Database connection configuration
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_dbname")]
    pub dbname: String,

    /// Usually supplied through `DB_USER`
    #[serde(default)]
    pub user: Option<String>,

    /// Usually supplied through `DB_PASSWORD`
    #[serde(default)]
    pub password: Option<String>,

    /// Schema that introspection is scoped to
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub ssl_mode: SslMode,

    /// Maximum time to establish a connection, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum time a single statement may run, in seconds.
    /// Also installed as the session's `statement_timeout`.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Open every session with `default_transaction_read_only`.
    /// Catches side-effecting functions hidden inside a SELECT.
    #[serde(default = "default_true")]
    pub read_only_session: bool,
}

/// SSL connection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    Require,
}

/// Row limits applied to `read_query`
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Rows returned when the caller does not ask for a specific amount
    #[serde(default = "default_max_rows")]
    pub default_max_rows: usize,

    /// Upper bound for a caller-supplied `max_rows`
    #[serde(default = "default_max_rows_limit")]
    pub max_rows_limit: usize,
}

fn default_host() -> String {
    "aact-db.ctti-clinicaltrials.org".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_dbname() -> String {
    "aact".to_string()
}

fn default_namespace() -> String {
    "ctgov".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_query_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_max_rows() -> usize {
    25
}

fn default_max_rows_limit() -> usize {
    1000
}

impl AactConfig {
    /// Load configuration
    ///
    /// Looks for a config file in:
    /// 1. `AACT_CONFIG_PATH` environment variable
    /// 2. `~/.binks/aact.toml`
    ///
    /// A missing file falls back to defaults. `DB_USER`, `DB_PASSWORD`,
    /// `DB_HOST`, `DB_PORT` and `DB_NAME` override whatever the file says.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration without failing
    ///
    /// An unreadable or invalid file is logged and replaced by defaults, and
    /// the environment overrides are applied either way, so credentials from
    /// `DB_USER` / `DB_PASSWORD` are never lost to a broken file.
    pub fn load_or_default() -> Self {
        Self::resolve(Self::config_path().as_deref(), |key| std::env::var(key).ok())
    }

    fn config_path() -> Option<PathBuf> {
        match std::env::var("AACT_CONFIG_PATH") {
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => dirs::home_dir().map(|home| home.join(".binks").join("aact.toml")),
        }
    }

    fn resolve<F>(path: Option<&Path>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path).unwrap_or_else(|e| {
                tracing::warn!("{:#}. Using defaults.", e);
                Self::default()
            }),
            _ => Self::default(),
        };

        if let Err(e) = config.apply_env(lookup) {
            tracing::warn!("{:#}. Keeping the configured value.", e);
        }
        config
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        toml::from_str(&content).with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Apply environment overrides through a lookup function
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db = &mut self.database;

        if let Some(user) = lookup("DB_USER") {
            db.user = Some(user);
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            db.password = Some(password);
        }
        if let Some(host) = lookup("DB_HOST") {
            db.host = host;
        }
        if let Some(dbname) = lookup("DB_NAME") {
            db.dbname = dbname;
        }
        // Last, so a bad port does not stop the other overrides
        if let Some(port) = lookup("DB_PORT") {
            db.port = port
                .parse()
                .with_context(|| format!("Invalid DB_PORT: {}", port))?;
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dbname: default_dbname(),
            user: None,
            password: None,
            namespace: default_namespace(),
            ssl_mode: SslMode::default(),
            connect_timeout_secs: default_connect_timeout(),
            query_timeout_secs: default_query_timeout(),
            read_only_session: true,
        }
    }
}

// Hand-written so the password never reaches a log line.
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("namespace", &self.namespace)
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("query_timeout_secs", &self.query_timeout_secs)
            .field("read_only_session", &self.read_only_session)
            .finish()
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_max_rows: default_max_rows(),
            max_rows_limit: default_max_rows_limit(),
        }
    }
}

impl QueryConfig {
    /// Resolve a caller-supplied row limit into `[1, max_rows_limit]`
    pub fn effective_max_rows(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_max_rows)
            .clamp(1, self.max_rows_limit.max(1))
    }
}
