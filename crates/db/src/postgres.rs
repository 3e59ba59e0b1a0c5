//! PostgreSQL schema source.
//!
//! Reads `information_schema` for one schema (default `public`), base tables
//! only. Queries run through the simple query protocol inside a
//! `READ ONLY` transaction that is always rolled back, so every value
//! arrives as text regardless of its column type.

use crate::{ColumnRow, QueryRows, SchemaSource, build_catalog, connect_error, query_error, within};
use async_trait::async_trait;
use sqlkeeper_config::DatabaseConfig;
use sqlkeeper_core::catalog::LiveCatalog;
use sqlkeeper_core::error::IntrospectError;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Executor, Row};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const TABLES_SQL: &str = "\
SELECT table_name::text AS table_name
FROM information_schema.tables
WHERE table_schema = $1 AND table_type = 'BASE TABLE'
ORDER BY table_name";

const COLUMNS_SQL: &str = "\
SELECT c.table_name::text AS table_name,
       c.column_name::text AS column_name,
       c.data_type::text AS data_type,
       c.udt_name::text AS udt_name,
       c.is_nullable::text AS is_nullable
FROM information_schema.columns c
JOIN information_schema.tables t
  ON t.table_schema = c.table_schema AND t.table_name = c.table_name
WHERE c.table_schema = $1 AND t.table_type = 'BASE TABLE'
ORDER BY c.table_name, c.ordinal_position";

const PRIMARY_KEYS_SQL: &str = "\
SELECT kcu.table_name::text AS table_name, kcu.column_name::text AS column_name
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON tc.constraint_name = kcu.constraint_name
 AND tc.table_schema = kcu.table_schema
 AND tc.table_name = kcu.table_name
WHERE tc.table_schema = $1 AND tc.constraint_type = 'PRIMARY KEY'
ORDER BY kcu.table_name, kcu.ordinal_position";

pub struct PostgresSource {
    pool: PgPool,
    schema: String,
    timeout_secs: u64,
}

impl PostgresSource {
    /// Connect from a `postgres://` URL.
    pub async fn connect_url(
        url: &str,
        schema: &str,
        timeout_secs: u64,
    ) -> Result<Self, IntrospectError> {
        let options = PgConnectOptions::from_str(url)
            .map_err(|e| IntrospectError::ConnectionError(format!("Invalid PostgreSQL URL: {e}")))?;
        Self::with_options(options, schema, timeout_secs).await
    }

    /// Connect from the individual host/port/user/password/database fields.
    pub async fn connect_params(config: &DatabaseConfig) -> Result<Self, IntrospectError> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);
        Self::with_options(options, &config.schema, config.connect_timeout_secs).await
    }

    async fn with_options(
        options: PgConnectOptions,
        schema: &str,
        timeout_secs: u64,
    ) -> Result<Self, IntrospectError> {
        let pool = within(timeout_secs, async {
            PgPoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Duration::from_secs(timeout_secs))
                .connect_with(options)
                .await
                .map_err(|e| connect_error(e, timeout_secs))
        })
        .await?;

        Ok(Self::from_pool(pool, schema, timeout_secs))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, schema: &str, timeout_secs: u64) -> Self {
        Self {
            pool,
            schema: schema.to_string(),
            timeout_secs,
        }
    }

    async fn fetch(&self, sql: &'static str) -> Result<Vec<PgRow>, IntrospectError> {
        sqlx::query(sql)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_error(e, self.timeout_secs))
    }

    /// Run `sql` in a read-only transaction and roll it back, whether or not
    /// the statement succeeded.
    async fn read_only_rows(&self, sql: &str) -> Result<Vec<PgRow>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let conn: &mut PgConnection = &mut tx;
        let rows = fetch_read_only(conn, sql).await;
        let rolled_back = tx.rollback().await;
        let rows = rows?;
        rolled_back?;
        Ok(rows)
    }

    fn text(&self, row: &PgRow, column: &str) -> Result<String, IntrospectError> {
        row.try_get(column)
            .map_err(|e| query_error(e, self.timeout_secs))
    }
}

async fn fetch_read_only(conn: &mut PgConnection, sql: &str) -> Result<Vec<PgRow>, sqlx::Error> {
    (&mut *conn)
        .execute(sqlx::raw_sql("SET TRANSACTION READ ONLY"))
        .await?;
    (&mut *conn).fetch_all(sqlx::raw_sql(sql)).await
}

/// The type reported for a column: `data_type`, except for user-defined and
/// array types where `data_type` carries no detail.
pub fn live_type(data_type: &str, udt_name: &str) -> String {
    if data_type.eq_ignore_ascii_case("USER-DEFINED") || data_type.eq_ignore_ascii_case("ARRAY") {
        udt_name.to_string()
    } else {
        data_type.to_string()
    }
}

#[async_trait]
impl SchemaSource for PostgresSource {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn introspect(&self) -> Result<LiveCatalog, IntrospectError> {
        within(self.timeout_secs, async {
            let tables = self
                .fetch(TABLES_SQL)
                .await?
                .iter()
                .map(|row| self.text(row, "table_name"))
                .collect::<Result<Vec<_>, _>>()?;

            let columns = self
                .fetch(COLUMNS_SQL)
                .await?
                .iter()
                .map(|row| {
                    Ok(ColumnRow {
                        table: self.text(row, "table_name")?,
                        column: self.text(row, "column_name")?,
                        data_type: live_type(
                            &self.text(row, "data_type")?,
                            &self.text(row, "udt_name")?,
                        ),
                        nullable: self.text(row, "is_nullable")? == "YES",
                    })
                })
                .collect::<Result<Vec<_>, IntrospectError>>()?;

            let primary_keys = self
                .fetch(PRIMARY_KEYS_SQL)
                .await?
                .iter()
                .map(|row| Ok((self.text(row, "table_name")?, self.text(row, "column_name")?)))
                .collect::<Result<Vec<_>, IntrospectError>>()?;

            debug!(
                schema = %self.schema,
                tables = tables.len(),
                columns = columns.len(),
                "Read PostgreSQL catalog"
            );
            Ok(build_catalog(tables, columns, primary_keys))
        })
        .await
    }

    async fn run_read_only(&self, sql: &str, limit: usize) -> Result<QueryRows, IntrospectError> {
        let timeout_secs = self.timeout_secs;
        let rows = within(timeout_secs, async {
            self.read_only_rows(sql)
                .await
                .map_err(|e| query_error(e, timeout_secs))
        })
        .await?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let truncated = rows.len() > limit;
        let rows = rows
            .iter()
            .take(limit)
            .map(|row| {
                (0..row.len())
                    .map(|idx| {
                        row.try_get_unchecked::<Option<String>, _>(idx)
                            .unwrap_or_else(|_| Some("<binary>".into()))
                    })
                    .collect()
            })
            .collect();

        Ok(QueryRows {
            columns,
            rows,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_type_prefers_udt_name_for_opaque_types() {
        assert_eq!(live_type("integer", "int4"), "integer");
        assert_eq!(live_type("USER-DEFINED", "order_status"), "order_status");
        assert_eq!(live_type("ARRAY", "_text"), "_text");
    }

    #[test]
    fn catalog_queries_are_scoped_to_base_tables() {
        for sql in [TABLES_SQL, COLUMNS_SQL] {
            assert!(sql.contains("BASE TABLE"));
            assert!(sql.contains("$1"));
        }
        assert!(PRIMARY_KEYS_SQL.contains("PRIMARY KEY"));
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn read_only_query_fails_cleanly_without_a_server() {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(1))
            .connect_lazy("postgres://ai:ai@127.0.0.1:1/ai")
            .unwrap();
        let source = PostgresSource::from_pool(pool, "public", 3);

        let rows = source.read_only_rows("SELECT 1");
        assert_send(&rows);
        assert!(rows.await.is_err());

        let err = source.run_read_only("SELECT 1", 10).await.unwrap_err();
        assert!(matches!(
            err,
            IntrospectError::ConnectionError(_)
                | IntrospectError::QueryFailed(_)
                | IntrospectError::Timeout { .. }
        ));
    }

    #[tokio::test]
    async fn unreachable_server_fails_fast() {
        let config = DatabaseConfig {
            host: "127.0.0.1".into(),
            port: 1,
            connect_timeout_secs: 2,
            ..Default::default()
        };
        let err = PostgresSource::connect_params(&config).await.err().unwrap();
        assert!(matches!(
            err,
            IntrospectError::ConnectionError(_) | IntrospectError::Timeout { .. }
        ));
    }
}
