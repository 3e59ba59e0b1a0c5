//! Save validated query tool — appends a working query to the knowledge
//! store so later sessions can reuse it.

use crate::{optional_str, required_str, string_list};
use async_trait::async_trait;
use sqlkeeper_core::error::ToolError;
use sqlkeeper_core::tool::{Tool, ToolResult};
use sqlkeeper_db::guard_read_only;
use sqlkeeper_knowledge::KnowledgeStore;
use std::sync::Arc;
use tracing::{info, warn};

pub struct SaveQueryTool {
    store: Arc<KnowledgeStore>,
}

impl SaveQueryTool {
    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        Self { store }
    }
}

/// Lowercase snake_case: runs of anything but ASCII letters and digits
/// become one underscore.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}

#[async_trait]
impl Tool for SaveQueryTool {
    fn name(&self) -> &str {
        "save_validated_query"
    }

    fn description(&self) -> &str {
        "Save a SQL query that ran successfully and answered the user's question, \
         so similar future questions can reuse it. Only SELECT or WITH queries."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Short snake_case name, e.g. monthly_revenue"
                },
                "question": {
                    "type": "string",
                    "description": "The natural-language question the query answers"
                },
                "query": {
                    "type": "string",
                    "description": "The exact SQL that was executed and validated"
                },
                "description": {
                    "type": "string",
                    "description": "What the query does and returns"
                },
                "tables_used": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Tables the query reads"
                }
            },
            "required": ["name", "question", "query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let raw_name = required_str(&arguments, "name")?;
        let question = required_str(&arguments, "question")?;
        let query = required_str(&arguments, "query")?;
        let summary = optional_str(&arguments, "description");
        let tables_used = string_list(&arguments, "tables_used")?;

        let name = snake_case(raw_name);
        if name.is_empty() {
            return Err(ToolError::InvalidArguments(format!(
                "Query name '{raw_name}' has no letters or digits"
            )));
        }

        let guarded = match guard_read_only(query) {
            Ok(guarded) => guarded,
            Err(e) => return Ok(ToolResult::failed(format!("Error: {e}. Query not saved."))),
        };

        if self.store.query_exists(&name) {
            info!(name = %name, "Query already saved, skipping");
            return Ok(ToolResult::ok(format!("Query '{name}' already exists, skipped."))
                .with_data(serde_json::json!({ "name": name, "saved": false })));
        }

        let mut description = vec![summary.unwrap_or(question).to_string()];
        if summary.is_some() {
            description.push(format!("Question: {question}"));
        }
        if !tables_used.is_empty() {
            description.push(format!("Tables: {}", tables_used.join(", ")));
        }

        match self
            .store
            .append_query(&name, &description.join("\n"), guarded.as_str())
        {
            Ok(path) => {
                info!(name = %name, path = %path.display(), "Saved validated query");
                Ok(ToolResult::ok(format!(
                    "Saved query '{name}'. It will be offered for similar future questions."
                ))
                .with_data(serde_json::json!({
                    "name": name,
                    "saved": true,
                    "path": path.display().to_string(),
                })))
            }
            Err(e) => {
                warn!(name = %name, error = %e, "Failed to save query");
                Ok(ToolResult::failed(format!("Error: Failed to save query: {e}")))
            }
        }
    }
}
