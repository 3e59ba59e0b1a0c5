//! SQLite schema source.
//!
//! Tables come from `sqlite_master`, columns and primary keys from
//! `pragma_table_info`. Connections are opened with `PRAGMA query_only`, so
//! any statement that slips past the guard still cannot write.

use crate::{ColumnRow, QueryRows, SchemaSource, build_catalog, connect_error, query_error, within};
use async_trait::async_trait;
use sqlkeeper_core::catalog::LiveCatalog;
use sqlkeeper_core::error::IntrospectError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub struct SqliteSource {
    pool: SqlitePool,
    timeout_secs: u64,
}

impl SqliteSource {
    /// Open an existing database from a `sqlite:` URL.
    pub async fn connect(url: &str, timeout_secs: u64) -> Result<Self, IntrospectError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| IntrospectError::ConnectionError(format!("Invalid SQLite URL: {e}")))?;
        Self::with_options(options, timeout_secs).await
    }

    /// Open an existing database file.
    pub async fn open(path: &Path, timeout_secs: u64) -> Result<Self, IntrospectError> {
        Self::with_options(SqliteConnectOptions::new().filename(path), timeout_secs).await
    }

    async fn with_options(
        options: SqliteConnectOptions,
        timeout_secs: u64,
    ) -> Result<Self, IntrospectError> {
        let options = options
            .create_if_missing(false)
            .pragma("query_only", "ON");

        let pool = within(timeout_secs, async {
            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Duration::from_secs(timeout_secs))
                .connect_with(options)
                .await
                .map_err(|e| connect_error(e, timeout_secs))
        })
        .await?;

        Ok(Self { pool, timeout_secs })
    }

    async fn table_names(&self) -> Result<Vec<String>, IntrospectError> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error(e, self.timeout_secs))?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<Result<_, _>>()
            .map_err(|e| query_error(e, self.timeout_secs))
    }

    async fn table_info(
        &self,
        table: &str,
    ) -> Result<(Vec<ColumnRow>, Vec<String>), IntrospectError> {
        let rows = sqlx::query(
            r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?1) ORDER BY cid"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error(e, self.timeout_secs))?;

        let mut columns = Vec::with_capacity(rows.len());
        let mut key_parts: Vec<(i64, String)> = Vec::new();
        for row in &rows {
            let decode = |e| query_error(e, self.timeout_secs);
            let name: String = row.try_get("name").map_err(decode)?;
            let data_type: String = row.try_get("type").map_err(decode)?;
            let not_null: i64 = row.try_get("notnull").map_err(decode)?;
            let pk: i64 = row.try_get("pk").map_err(decode)?;

            if pk > 0 {
                key_parts.push((pk, name.clone()));
            }
            columns.push(ColumnRow {
                table: table.to_string(),
                column: name,
                data_type,
                nullable: not_null == 0,
            });
        }

        key_parts.sort();
        Ok((columns, key_parts.into_iter().map(|(_, name)| name).collect()))
    }
}

/// Every cell as text. SQLite converts numbers on read; undecodable blobs
/// are shown as a marker.
fn text_cells(row: &SqliteRow) -> Vec<Option<String>> {
    (0..row.len())
        .map(|idx| {
            row.try_get_unchecked::<Option<String>, _>(idx)
                .unwrap_or_else(|_| Some("<binary>".into()))
        })
        .collect()
}

#[async_trait]
impl SchemaSource for SqliteSource {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn introspect(&self) -> Result<LiveCatalog, IntrospectError> {
        within(self.timeout_secs, async {
            let tables = self.table_names().await?;
            let mut columns = Vec::new();
            let mut primary_keys = Vec::new();
            for table in &tables {
                let (table_columns, key) = self.table_info(table).await?;
                columns.extend(table_columns);
                primary_keys.extend(key.into_iter().map(|c| (table.clone(), c)));
            }
            debug!(tables = tables.len(), columns = columns.len(), "Read SQLite catalog");
            Ok(build_catalog(tables, columns, primary_keys))
        })
        .await
    }

    async fn run_read_only(&self, sql: &str, limit: usize) -> Result<QueryRows, IntrospectError> {
        let rows = within(self.timeout_secs, async {
            sqlx::query(sql)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| query_error(e, self.timeout_secs))
        })
        .await?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let truncated = rows.len() > limit;
        let rows = rows.iter().take(limit).map(text_cells).collect();

        Ok(QueryRows {
            columns,
            rows,
            truncated,
        })
    }
}
