//! Live schema introspection and read-only query execution.
//!
//! [`connect`] picks a backend from the configured connection URL:
//! `postgres://` / `postgresql://` (or no URL, with the individual `DB_*`
//! parameters) connects to PostgreSQL, `sqlite:` opens a SQLite file.
//! Neither backend ever issues writes.

pub mod guard;
pub mod lazy;
pub mod postgres;
pub mod sqlite;

pub use guard::{GuardedSql, guard_read_only};
pub use lazy::LazySource;
pub use postgres::PostgresSource;
pub use sqlite::SqliteSource;

use async_trait::async_trait;
use sqlkeeper_config::DatabaseConfig;
use sqlkeeper_core::catalog::{LiveCatalog, LiveColumn, LiveTable};
use sqlkeeper_core::error::IntrospectError;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// A live database the tool can read its catalog from.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Short backend name for logs and tool output.
    fn backend(&self) -> &'static str;

    /// Read the current catalog. Nothing is cached between calls.
    async fn introspect(&self) -> Result<LiveCatalog, IntrospectError>;

    /// Run an already-guarded statement and return at most `limit` rows.
    async fn run_read_only(&self, sql: &str, limit: usize) -> Result<QueryRows, IntrospectError>;
}

/// Rows returned by [`SchemaSource::run_read_only`], every cell as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    /// More rows were returned than the limit allowed.
    pub truncated: bool,
}

impl QueryRows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Connect to the database described by `config`.
pub async fn connect(config: &DatabaseConfig) -> Result<Box<dyn SchemaSource>, IntrospectError> {
    let timeout_secs = config.connect_timeout_secs;
    let source: Box<dyn SchemaSource> = match config.url.as_deref() {
        Some(url) if url.starts_with("sqlite:") => {
            Box::new(SqliteSource::connect(url, timeout_secs).await?)
        }
        Some(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {
            Box::new(PostgresSource::connect_url(url, &config.schema, timeout_secs).await?)
        }
        Some(url) => {
            let scheme = url.split(':').next().unwrap_or(url);
            return Err(IntrospectError::Unsupported(format!(
                "unsupported database URL scheme '{scheme}'"
            )));
        }
        None => Box::new(PostgresSource::connect_params(config).await?),
    };

    info!(backend = source.backend(), target = %config.display_target(), "Connected to database");
    Ok(source)
}

/// Bound `fut` by `timeout_secs`.
pub(crate) async fn within<T>(
    timeout_secs: u64,
    fut: impl Future<Output = Result<T, IntrospectError>>,
) -> Result<T, IntrospectError> {
    tokio::time::timeout(Duration::from_secs(timeout_secs), fut)
        .await
        .unwrap_or(Err(IntrospectError::Timeout { timeout_secs }))
}

pub(crate) fn connect_error(e: sqlx::Error, timeout_secs: u64) -> IntrospectError {
    match e {
        sqlx::Error::PoolTimedOut => IntrospectError::Timeout { timeout_secs },
        other => IntrospectError::ConnectionError(other.to_string()),
    }
}

pub(crate) fn query_error(e: sqlx::Error, timeout_secs: u64) -> IntrospectError {
    match e {
        sqlx::Error::PoolTimedOut => IntrospectError::Timeout { timeout_secs },
        sqlx::Error::Io(io) => IntrospectError::ConnectionError(io.to_string()),
        other => IntrospectError::QueryFailed(other.to_string()),
    }
}

/// One row of a column catalog query.
#[derive(Debug, Clone)]
pub(crate) struct ColumnRow {
    pub table: String,
    pub column: String,
    pub data_type: String,
    pub nullable: bool,
}

/// Group catalog rows into tables. Tables without any column rows are kept.
pub(crate) fn build_catalog(
    tables: Vec<String>,
    columns: Vec<ColumnRow>,
    primary_keys: Vec<(String, String)>,
) -> LiveCatalog {
    let mut by_name: BTreeMap<String, LiveTable> = tables
        .into_iter()
        .map(|name| {
            let table = LiveTable {
                name: name.clone(),
                columns: Vec::new(),
                primary_key: Vec::new(),
            };
            (name, table)
        })
        .collect();

    for row in columns {
        if let Some(table) = by_name.get_mut(&row.table) {
            table.columns.push(LiveColumn {
                name: row.column,
                data_type: row.data_type,
                nullable: row.nullable,
            });
        }
    }

    for (table, column) in primary_keys {
        if let Some(table) = by_name.get_mut(&table) {
            table.primary_key.push(column);
        }
    }

    by_name.into_values().collect()
}
