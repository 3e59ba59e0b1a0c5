//! Introspect schema tool — live table list and per-table column detail.

use crate::optional_str;
use async_trait::async_trait;
use sqlkeeper_core::catalog::{LiveCatalog, LiveTable};
use sqlkeeper_core::error::ToolError;
use sqlkeeper_core::tool::{Tool, ToolResult};
use sqlkeeper_db::SchemaSource;
use std::sync::Arc;
use tracing::warn;

pub struct IntrospectSchemaTool {
    source: Arc<dyn SchemaSource>,
}

impl IntrospectSchemaTool {
    pub fn new(source: Arc<dyn SchemaSource>) -> Self {
        Self { source }
    }
}

/// Markdown list of every live table with its column count.
pub fn render_table_list(catalog: &LiveCatalog) -> String {
    if catalog.is_empty() {
        return "No tables found in the database.".into();
    }

    let mut lines = vec!["## Database Tables".to_string(), String::new()];
    for table in catalog.tables.values() {
        lines.push(format!("- **{}** ({} columns)", table.name, table.columns.len()));
    }
    lines.push(String::new());
    lines.push("_Call introspect_schema with table_name for column details._".into());
    lines.join("\n")
}

/// Markdown detail for one live table.
pub fn render_table(table: &LiveTable) -> String {
    let mut lines = vec![format!("## Table: {}", table.name), String::new()];

    if !table.columns.is_empty() {
        lines.push("### Columns".into());
        lines.push(String::new());
        lines.push("| Column | Type | Nullable |".into());
        lines.push("| --- | --- | --- |".into());
        for column in &table.columns {
            let nullable = if column.nullable { "Yes" } else { "No" };
            lines.push(format!("| {} | {} | {nullable} |", column.name, column.data_type));
        }
        lines.push(String::new());
    }

    if !table.primary_key.is_empty() {
        lines.push(format!("**Primary Key:** {}", table.primary_key.join(", ")));
    }

    lines.join("\n").trim_end().to_string()
}

#[async_trait]
impl Tool for IntrospectSchemaTool {
    fn name(&self) -> &str {
        "introspect_schema"
    }

    fn description(&self) -> &str {
        "Inspect the live database schema. Without arguments lists all tables; \
         with table_name describes that table's columns and primary key."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "table_name": {
                    "type": "string",
                    "description": "Table to describe. Omit to list all tables."
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let table_name = optional_str(&arguments, "table_name");

        let catalog = match self.source.introspect().await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "Schema introspection failed");
                return Ok(ToolResult::failed(format!("Error inspecting schema: {e}")));
            }
        };

        let Some(name) = table_name else {
            let names: Vec<&str> = catalog.table_names().collect();
            return Ok(ToolResult::ok(render_table_list(&catalog))
                .with_data(serde_json::json!({ "tables": names })));
        };

        match catalog.table(name) {
            Some(table) => {
                let data =
                    serde_json::to_value(table).map_err(|e| ToolError::ExecutionFailed {
                        tool_name: "introspect_schema".into(),
                        reason: e.to_string(),
                    })?;
                Ok(ToolResult::ok(render_table(table)).with_data(data))
            }
            None => {
                let available: Vec<&str> = catalog.table_names().collect();
                Ok(ToolResult::failed(format!(
                    "Error: Table '{name}' not found. Available tables: {}",
                    available.join(", ")
                )))
            }
        }
    }
}
