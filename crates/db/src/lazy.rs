//! A schema source that connects on first use.

use crate::{QueryRows, SchemaSource, connect};
use async_trait::async_trait;
use sqlkeeper_config::DatabaseConfig;
use sqlkeeper_core::catalog::LiveCatalog;
use sqlkeeper_core::error::IntrospectError;
use tokio::sync::OnceCell;

/// Defers [`connect`] until a tool actually needs the database, so commands
/// that only touch the knowledge store work offline.
pub struct LazySource {
    config: DatabaseConfig,
    inner: OnceCell<Box<dyn SchemaSource>>,
}

impl LazySource {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            inner: OnceCell::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.initialized()
    }

    async fn source(&self) -> Result<&dyn SchemaSource, IntrospectError> {
        let source = self
            .inner
            .get_or_try_init(|| async { connect(&self.config).await })
            .await?;
        Ok(source.as_ref())
    }
}

#[async_trait]
impl SchemaSource for LazySource {
    fn backend(&self) -> &'static str {
        match self.config.url.as_deref() {
            Some(url) if url.starts_with("sqlite:") => "sqlite",
            _ => "postgres",
        }
    }

    async fn introspect(&self) -> Result<LiveCatalog, IntrospectError> {
        self.source().await?.introspect().await
    }

    async fn run_read_only(&self, sql: &str, limit: usize) -> Result<QueryRows, IntrospectError> {
        self.source().await?.run_read_only(sql, limit).await
    }
}
