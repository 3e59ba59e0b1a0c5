//! Run SQL tool — read-only queries against the live database.

use crate::required_str;
use async_trait::async_trait;
use sqlkeeper_config::ToolsConfig;
use sqlkeeper_core::error::ToolError;
use sqlkeeper_core::tool::{Tool, ToolResult};
use sqlkeeper_db::{QueryRows, SchemaSource, guard_read_only};
use std::sync::Arc;
use tracing::{debug, warn};

/// Longest cell value shown in the result table.
const MAX_CELL_CHARS: usize = 50;

pub struct RunSqlTool {
    source: Arc<dyn SchemaSource>,
    default_limit: usize,
    max_limit: usize,
}

impl RunSqlTool {
    pub fn new(source: Arc<dyn SchemaSource>, config: &ToolsConfig) -> Self {
        Self {
            source,
            default_limit: config.default_row_limit,
            max_limit: config.max_row_limit,
        }
    }

    fn limit(&self, arguments: &serde_json::Value) -> Result<usize, ToolError> {
        let requested = match &arguments["limit"] {
            serde_json::Value::Null => self.default_limit,
            value => value
                .as_u64()
                .filter(|n| *n > 0)
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| {
                    ToolError::InvalidArguments("'limit' must be a positive integer".into())
                })?,
        };
        Ok(requested.min(self.max_limit))
    }
}

fn cell(value: &Option<String>) -> String {
    match value {
        None => "NULL".into(),
        Some(text) => text
            .chars()
            .take(MAX_CELL_CHARS)
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect::<String>()
            .replace('|', "\\|"),
    }
}

/// Markdown table of `rows` plus a row count line.
pub fn render_rows(rows: &QueryRows) -> String {
    if rows.is_empty() {
        return "Query returned no results.".into();
    }

    let mut lines = vec![
        format!("| {} |", rows.columns.join(" | ")),
        format!("| {} |", vec!["---"; rows.columns.len()].join(" | ")),
    ];
    for row in &rows.rows {
        let cells: Vec<String> = row.iter().map(cell).collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }

    let count = rows.rows.len();
    if rows.truncated {
        lines.push(format!("\n_{count} row(s) returned, more rows were cut off_"));
    } else {
        lines.push(format!("\n_{count} row(s) returned_"));
    }
    lines.join("\n")
}

#[async_trait]
impl Tool for RunSqlTool {
    fn name(&self) -> &str {
        "run_sql"
    }

    fn description(&self) -> &str {
        "Execute a read-only SQL query against the database. Only SELECT or WITH \
         statements are allowed; a LIMIT is added when the query has none."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The SQL query to execute. Must be a SELECT or WITH statement."
                },
                "limit": {
                    "type": "integer",
                    "description": format!(
                        "Maximum number of rows to return (default {}, at most {})",
                        self.default_limit, self.max_limit
                    )
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = required_str(&arguments, "query")?;
        let limit = self.limit(&arguments)?;

        let guarded = match guard_read_only(query) {
            Ok(guarded) => guarded,
            Err(e) => return Ok(ToolResult::failed(format!("Error: {e}"))),
        };

        let sql = guarded.with_limit(limit);
        debug!(backend = self.source.backend(), sql = %sql, "Running query");

        match self.source.run_read_only(&sql, limit).await {
            Ok(rows) => {
                let data = serde_json::json!({
                    "columns": rows.columns,
                    "row_count": rows.rows.len(),
                    "truncated": rows.truncated,
                });
                Ok(ToolResult::ok(render_rows(&rows)).with_data(data))
            }
            Err(e) => {
                warn!(error = %e, "Query failed");
                Ok(ToolResult::failed(format!("SQL Error: {e}")))
            }
        }
    }
}
