//! Agent tools for SQLKeeper.
//!
//! Four tools are exposed to an external agent runtime:
//! `run_sql` and `introspect_schema` read the live database,
//! `save_validated_query` and `save_learning` write to the knowledge store.

pub mod introspect_schema;
pub mod run_sql;
pub mod save_learning;
pub mod save_query;

use sqlkeeper_config::ToolsConfig;
use sqlkeeper_core::error::ToolError;
use sqlkeeper_core::tool::ToolRegistry;
use sqlkeeper_db::SchemaSource;
use sqlkeeper_knowledge::KnowledgeStore;
use std::sync::Arc;

pub use introspect_schema::{IntrospectSchemaTool, render_table, render_table_list};
pub use run_sql::{RunSqlTool, render_rows};
pub use save_learning::SaveLearningTool;
pub use save_query::SaveQueryTool;

/// Create a registry with all four tools.
pub fn default_registry(
    source: Arc<dyn SchemaSource>,
    store: Arc<KnowledgeStore>,
    config: &ToolsConfig,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(RunSqlTool::new(source.clone(), config)));
    registry.register(Box::new(IntrospectSchemaTool::new(source)));
    registry.register(Box::new(SaveQueryTool::new(store.clone())));
    registry.register(Box::new(SaveLearningTool::new(store)));
    registry
}

/// A required, non-blank string argument.
pub(crate) fn required_str<'a>(
    arguments: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, ToolError> {
    match arguments[key].as_str().map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        Some(_) => Err(ToolError::InvalidArguments(format!("'{key}' must not be empty"))),
        None => Err(ToolError::InvalidArguments(format!("Missing '{key}' argument"))),
    }
}

/// An optional string argument; blank counts as absent.
pub(crate) fn optional_str<'a>(arguments: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    arguments[key]
        .as_str()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// An optional array of strings. Non-string entries are rejected.
pub(crate) fn string_list(
    arguments: &serde_json::Value,
    key: &str,
) -> Result<Vec<String>, ToolError> {
    match &arguments[key] {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(|s| s.trim().to_string()).ok_or_else(|| {
                    ToolError::InvalidArguments(format!("'{key}' must be a list of strings"))
                })
            })
            .collect(),
        _ => Err(ToolError::InvalidArguments(format!(
            "'{key}' must be a list of strings"
        ))),
    }
}
