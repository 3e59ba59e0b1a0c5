//! Save learning tool — records a discovery about the data.

use crate::{optional_str, required_str, string_list};
use async_trait::async_trait;
use chrono::Utc;
use sqlkeeper_core::error::ToolError;
use sqlkeeper_core::knowledge::{Learning, LearningCategory};
use sqlkeeper_core::tool::{Tool, ToolResult};
use sqlkeeper_knowledge::KnowledgeStore;
use std::sync::Arc;
use tracing::warn;

pub struct SaveLearningTool {
    store: Arc<KnowledgeStore>,
}

impl SaveLearningTool {
    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SaveLearningTool {
    fn name(&self) -> &str {
        "save_learning"
    }

    fn description(&self) -> &str {
        "Save a discovered quirk, fix or pattern about the data for future sessions. \
         Duplicate descriptions are skipped."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        let categories: Vec<&str> = LearningCategory::ALL.iter().map(|c| c.as_str()).collect();
        serde_json::json!({
            "type": "object",
            "properties": {
                "category": {
                    "type": "string",
                    "enum": categories,
                    "description": "Kind of learning"
                },
                "description": {
                    "type": "string",
                    "description": "The actionable insight, e.g. 'position is TEXT, cast before comparing'"
                },
                "tables_affected": {
                    "type": "array",
                    "items": { "type": "string" }
                },
                "example": {
                    "type": "string",
                    "description": "SQL or value showing the issue or fix"
                }
            },
            "required": ["category", "description"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let raw_category = required_str(&arguments, "category")?;
        let category = LearningCategory::parse(&raw_category.to_ascii_lowercase()).ok_or_else(|| {
            let expected: Vec<&str> = LearningCategory::ALL.iter().map(|c| c.as_str()).collect();
            ToolError::InvalidArguments(format!(
                "Unknown category '{raw_category}', expected one of: {}",
                expected.join(", ")
            ))
        })?;
        let description = required_str(&arguments, "description")?;
        let tables_affected = string_list(&arguments, "tables_affected")?;
        let example = optional_str(&arguments, "example").map(str::to_string);

        if self.store.learning_exists(description) {
            return Ok(ToolResult::ok("A learning with this description already exists, skipped.")
                .with_data(serde_json::json!({ "saved": false })));
        }

        let learning = Learning {
            category,
            description: description.to_string(),
            tables_affected,
            example,
            discovered_at: Some(Utc::now()),
        };

        match self.store.write_learning(&learning) {
            Ok(path) => Ok(ToolResult::ok(format!("Learning saved ({category})."))
                .with_data(serde_json::json!({
                    "saved": true,
                    "path": path.display().to_string(),
                }))),
            Err(e) => {
                warn!(error = %e, "Failed to save learning");
                Ok(ToolResult::failed(format!("Error: Failed to save learning: {e}")))
            }
        }
    }
}
